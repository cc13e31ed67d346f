// src/core/persistence.rs

//! # Persisted Projects
//!
//! A resolved [`TopLevelProject`] is stored as one file, by default
//! `<buildDirectory>/<id>.bg`:
//!
//! | Bytes      | Content                                   |
//! |------------|-------------------------------------------|
//! | 8          | [`BUILD_GRAPH_MAGIC`]                     |
//! | 4 (LE)     | [`BUILD_GRAPH_FORMAT_VERSION`]            |
//! | 4 (LE) + n | length-prefixed UTF-8 project id          |
//! | rest       | `lz4` (size-prepended) of the `bincode` payload |
//!
//! Shared property maps are written once per owner; after loading, owners no
//! longer share their maps.

use crate::constants::{BUILD_GRAPH_FORMAT_VERSION, BUILD_GRAPH_MAGIC};
use crate::models::TopLevelProject;
use log::{debug, trace};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a stored project.")]
    BadMagic(PathBuf),

    #[error("'{path}' was stored with format version {found}, expected {expected}.")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("'{0}' is truncated or corrupt.")]
    Corrupt(PathBuf),

    #[error("Failed to decompress '{path}': {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: lz4_flex::block::DecompressError,
    },

    #[error("Failed to encode to binary format: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode from binary format: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// The fixed-size header fields plus the id of a stored project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHeader {
    pub version: u32,
    pub project_id: String,
}

/// Writes `project` to `path`, replacing any previous file atomically.
///
/// # Errors
/// Returns [`PersistenceError::Io`] if the directory or the file cannot be
/// written, or [`PersistenceError::BincodeEncode`].
pub fn store(project: &TopLevelProject, path: &Path) -> PersistenceResult<()> {
    let io_error = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error)?;

    let payload = bincode::serde::encode_to_vec(project, bincode::config::standard())?;
    trace!("Serialized project '{}' to {} bytes.", project.id, payload.len());
    let compressed = lz4_flex::compress_prepend_size(&payload);
    trace!("Compressed to {} bytes.", compressed.len());

    let id = project.id.as_bytes();
    let id_len = u32::try_from(id.len()).map_err(|_| PersistenceError::Corrupt(path.to_path_buf()))?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(BUILD_GRAPH_MAGIC).map_err(io_error)?;
    file.write_all(&BUILD_GRAPH_FORMAT_VERSION.to_le_bytes()).map_err(io_error)?;
    file.write_all(&id_len.to_le_bytes()).map_err(io_error)?;
    file.write_all(id).map_err(io_error)?;
    file.write_all(&compressed).map_err(io_error)?;
    file.persist(path).map_err(|e| io_error(e.error))?;
    debug!("Stored project '{}' at '{}'.", project.id, path.display());
    Ok(())
}

/// Reads a project written by [`store`].
///
/// # Errors
/// Returns [`PersistenceError::BadMagic`] or [`PersistenceError::VersionMismatch`]
/// for files that are not (current) stored projects, and
/// [`PersistenceError::Corrupt`], [`PersistenceError::Decompress`] or
/// [`PersistenceError::BincodeDecode`] for damaged ones.
pub fn load(path: &Path) -> PersistenceResult<TopLevelProject> {
    let bytes = fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (header, payload) = parse_header(path, &bytes)?;
    let decompressed =
        lz4_flex::decompress_size_prepended(payload).map_err(|source| PersistenceError::Decompress {
            path: path.to_path_buf(),
            source,
        })?;
    let (project, _): (TopLevelProject, usize) =
        bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())?;
    if project.id != header.project_id {
        return Err(PersistenceError::Corrupt(path.to_path_buf()));
    }
    debug!("Loaded project '{}' from '{}'.", project.id, path.display());
    Ok(project)
}

/// Reads only the header, e.g. to find out which configuration a file holds.
///
/// # Errors
/// Same as [`load`], minus the payload errors.
pub fn read_header(path: &Path) -> PersistenceResult<StoredHeader> {
    let bytes = fs::read(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_header(path, &bytes).map(|(header, _)| header)
}

fn parse_header<'b>(path: &Path, bytes: &'b [u8]) -> PersistenceResult<(StoredHeader, &'b [u8])> {
    let corrupt = || PersistenceError::Corrupt(path.to_path_buf());
    let (magic, rest) = bytes
        .split_at_checked(BUILD_GRAPH_MAGIC.len())
        .ok_or_else(|| PersistenceError::BadMagic(path.to_path_buf()))?;
    if magic != BUILD_GRAPH_MAGIC {
        return Err(PersistenceError::BadMagic(path.to_path_buf()));
    }
    let (version, rest) = read_u32(rest).ok_or_else(corrupt)?;
    if version != BUILD_GRAPH_FORMAT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            path: path.to_path_buf(),
            found: version,
            expected: BUILD_GRAPH_FORMAT_VERSION,
        });
    }
    let (id_len, rest) = read_u32(rest).ok_or_else(corrupt)?;
    let id_len = usize::try_from(id_len).map_err(|_| corrupt())?;
    let (id, payload) = rest.split_at_checked(id_len).ok_or_else(corrupt)?;
    let project_id = String::from_utf8(id.to_vec()).map_err(|_| corrupt())?;
    Ok((StoredHeader { version, project_id }, payload))
}

fn read_u32(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let (head, rest) = bytes.split_at_checked(4)?;
    let head: [u8; 4] = head.try_into().ok()?;
    Some((u32::from_le_bytes(head), rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_info::ErrorInfo;
    use crate::core::loader_result::ProductDependency;
    use crate::core::test_support::{TreeBuilder, resolve, setup, touch};

    fn resolved_project(dir: &Path) -> TopLevelProject {
        touch(dir, &["main.cpp"]);
        let mut tree = TreeBuilder::new(dir);
        let root = tree.project("stored");
        let app = tree.product(root, "app", &[("files", r#"["main.cpp"]"#)]);
        tree.module(app, "qbs", &[("install", "true")]);
        tree.product(root, "lib", &[]);
        tree.depends(app, ProductDependency::by_name("lib"));
        resolve(tree.finish(root), setup(dir, false)).unwrap()
    }

    #[test]
    fn test_store_and_load() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let mut project = resolved_project(dir.path());
        project.warnings.push(ErrorInfo::message("kept"));
        let path = PathBuf::from(project.build_graph_file_path());

        // --- Execute ---
        store(&project, &path).unwrap();
        let loaded = load(&path).unwrap();

        // --- Assert ---
        assert_eq!(loaded.id, "debug");
        assert_eq!(loaded.projects, project.projects);
        assert_eq!(loaded.products.len(), 2);
        let app = loaded.product_by_unique_name("app").unwrap();
        assert_eq!(loaded[app].dependencies, project[app].dependencies);
        assert_eq!(loaded[app].groups, project[app].groups);
        assert_eq!(loaded[app].module_properties, project[app].module_properties);
        assert_eq!(loaded.warnings, project.warnings);
        assert_eq!(read_header(&path).unwrap().project_id, "debug");
    }

    #[test]
    fn test_rejects_foreign_and_outdated_files() {
        let dir = tempfile::tempdir().unwrap();
        let foreign = dir.path().join("foreign.bg");
        fs::write(&foreign, b"not a project at all").unwrap();
        assert!(matches!(load(&foreign), Err(PersistenceError::BadMagic(_))));

        let outdated = dir.path().join("outdated.bg");
        let mut bytes = BUILD_GRAPH_MAGIC.to_vec();
        bytes.extend_from_slice(&(BUILD_GRAPH_FORMAT_VERSION + 1).to_le_bytes());
        fs::write(&outdated, bytes).unwrap();
        assert!(matches!(
            load(&outdated),
            Err(PersistenceError::VersionMismatch { found, .. }) if found == BUILD_GRAPH_FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = resolved_project(dir.path());
        let path = dir.path().join("p.bg");
        store(&project, &path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        assert!(load(&path).is_err());
    }
}
