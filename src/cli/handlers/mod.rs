// src/cli/handlers/mod.rs

pub mod commons;
pub mod resolve;
pub mod show;
