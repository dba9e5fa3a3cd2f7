//! Filesystem helpers shared by the ingestion steps. Every write that a later
//! run may treat as "already done" goes through a temp path plus rename.

use std::fs;
use std::io::Write;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::IngestError;

pub fn ensure_dir(path: &Utf8Path) -> Result<(), IngestError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("create {path}: {err}")))
}

/// True when `path` is a directory holding at least one entry.
pub fn dir_has_entries(path: &Utf8Path) -> Result<bool, IngestError> {
    if !path.as_std_path().is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("read {path}: {err}")))?;
    Ok(entries.next().is_some())
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), IngestError> {
    let parent = parent_dir(path);
    ensure_dir(parent)?;
    let mut temp = Builder::new()
        .prefix(".nfl-ingest")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| IngestError::Filesystem(format!("write {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

/// Moves a fully written file into place, replacing any previous one.
pub fn move_file_atomic(source: &Path, dest: &Utf8Path) -> Result<(), IngestError> {
    ensure_dir(parent_dir(dest))?;
    fs::rename(source, dest.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("rename into {dest}: {err}")))
}

pub fn atomic_rename_dir(from: &Path, to: &Utf8Path) -> Result<(), IngestError> {
    if to.as_std_path().exists() {
        fs::remove_dir_all(to.as_std_path())
            .map_err(|err| IngestError::Filesystem(format!("remove {to}: {err}")))?;
    }
    fs::rename(from, to.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("rename into {to}: {err}")))
}

/// All directories below `root`, excluding `root` itself.
pub fn walk_dirs(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, IngestError> {
    let mut dirs = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        for entry in read_dir_utf8(&path)? {
            if entry.as_std_path().is_dir() {
                stack.push(entry.clone());
                dirs.push(entry);
            }
        }
    }
    Ok(dirs)
}

/// Regular files directly inside `dir`, sorted by name.
pub fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, IngestError> {
    let mut files = read_dir_utf8(dir)?
        .into_iter()
        .filter(|path| path.as_std_path().is_file())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

pub fn to_utf8(path: &Path) -> Result<Utf8PathBuf, IngestError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| IngestError::Filesystem(format!("non-utf8 path {}", path.display())))
}

fn read_dir_utf8(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, IngestError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| IngestError::Filesystem(format!("read {dir}: {err}")))?;
    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| IngestError::Filesystem(err.to_string()))?;
        items.push(to_utf8(&entry.path())?);
    }
    Ok(items)
}

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let root = to_utf8(temp.path()).unwrap();
        let path = root.join("nested").join("file.csv");

        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");
        assert_eq!(list_files(&root.join("nested")).unwrap(), vec![path]);
    }

    #[test]
    fn empty_and_missing_dirs_have_no_entries() {
        let temp = tempfile::tempdir().unwrap();
        let root = to_utf8(temp.path()).unwrap();
        assert!(!dir_has_entries(&root).unwrap());
        assert!(!dir_has_entries(&root.join("missing")).unwrap());
        fs::write(root.join("a").as_std_path(), b"x").unwrap();
        assert!(dir_has_entries(&root).unwrap());
    }

    #[test]
    fn walk_dirs_finds_nested_directories() {
        let temp = tempfile::tempdir().unwrap();
        let root = to_utf8(temp.path()).unwrap();
        fs::create_dir_all(root.join("a").join("b").as_std_path()).unwrap();
        fs::write(root.join("a").join("file").as_std_path(), b"x").unwrap();

        let mut dirs = walk_dirs(&root).unwrap();
        dirs.sort();
        assert_eq!(dirs, vec![root.join("a"), root.join("a").join("b")]);
    }
}
