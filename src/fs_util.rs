use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use zip::ZipArchive;

use crate::error::IngestError;

/// Unpacks `zip_path` below `target_dir` in one pass and returns the number of
/// files written.
///
/// Every file entry is read to its end, which is where the zip reader checks
/// the stored CRC, so a corrupt member fails the call. `target_dir` is then
/// left half-populated; callers unpack into a scratch directory and drop it
/// on error.
pub fn unpack_zip(zip_path: &Utf8Path, target_dir: &Path) -> Result<usize, IngestError> {
    let unpack_err = |message: String| IngestError::Extraction {
        path: zip_path.to_path_buf(),
        message,
    };

    let file = File::open(zip_path.as_std_path())
        .map_err(|err| unpack_err(format!("open: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| unpack_err(err.to_string()))?;

    let mut files = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| unpack_err(err.to_string()))?;
        let dest = entry_destination(entry.name(), entry.enclosed_name(), target_dir)
            .map_err(&unpack_err)?;
        if entry.is_dir() {
            fs::create_dir_all(&dest).map_err(|err| unpack_err(format!("{}: {err}", entry.name())))?;
        } else {
            write_entry(&mut entry, &dest)
                .map_err(|err| unpack_err(format!("{}: {err}", entry.name())))?;
            files += 1;
        }
    }
    Ok(files)
}

fn entry_destination(
    name: &str,
    enclosed: Option<PathBuf>,
    target_dir: &Path,
) -> Result<PathBuf, String> {
    enclosed
        .map(|relative| target_dir.join(relative))
        .ok_or_else(|| format!("entry {name} escapes the extraction directory"))
}

fn write_entry(entry: &mut impl io::Read, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(dest)?;
    io::copy(entry, &mut out)?;
    Ok(())
}
