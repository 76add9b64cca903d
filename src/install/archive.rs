//! Archive extraction and locating the usql binary inside it.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use tar::Archive;
use zip::ZipArchive;

use crate::error::{GateError, Result};
use crate::platform::ArchiveFormat;

/// How many directory levels below the extraction root are searched.
pub const MAX_SEARCH_DEPTH: usize = 8;

/// Extracts `archive_path` into `dest_dir`.
pub fn extract_archive(archive_path: &Path, format: ArchiveFormat, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| {
        GateError::extraction(format!("Failed to open {}: {}", archive_path.display(), e))
    })?;

    match format {
        ArchiveFormat::TarBz2 => {
            let mut archive = Archive::new(BzDecoder::new(BufReader::new(file)));
            archive
                .unpack(dest_dir)
                .map_err(|e| GateError::extraction(format!("tar.bz2: {}", e)))?;
        }
        ArchiveFormat::Zip => {
            let mut archive = ZipArchive::new(BufReader::new(file))
                .map_err(|e| GateError::extraction(format!("zip: {}", e)))?;
            archive
                .extract(dest_dir)
                .map_err(|e| GateError::extraction(format!("zip: {}", e)))?;
        }
    }

    Ok(())
}

/// Returns true if `file_name` looks like the usql executable.
///
/// Matches `usql`, the platform binary name (e.g. `usql.exe`), or any name
/// starting with `usql` that has no extension.
pub fn is_usql_binary(file_name: &str, binary_name: &str) -> bool {
    file_name == "usql"
        || file_name == binary_name
        || (file_name.starts_with("usql") && !file_name.contains('.'))
}

/// Depth-first search of `root` for the usql binary.
///
/// Entries are visited in name order so the result does not depend on the
/// filesystem's directory ordering. Only regular files match.
pub fn find_binary(root: &Path, binary_name: &str) -> Result<PathBuf> {
    search_dir(root, binary_name, 0)
        .map_err(|e| GateError::extraction(format!("Failed to read {}: {}", root.display(), e)))?
        .ok_or(GateError::BinaryNotFoundInArchive)
}

fn search_dir(dir: &Path, binary_name: &str, depth: usize) -> io::Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            if depth < MAX_SEARCH_DEPTH {
                if let Some(found) = search_dir(&path, binary_name, depth + 1)? {
                    return Ok(Some(found));
                }
            }
        } else if file_type.is_file()
            && is_usql_binary(&entry.file_name().to_string_lossy(), binary_name)
        {
            return Ok(Some(path));
        }
    }

    Ok(None)
}
