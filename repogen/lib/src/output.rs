//! Writing generated files to disk.
//!
//! Files are staged as temp files in their target directory and persisted
//! with a rename. A struct's implementation and interface are staged
//! together and only persisted once both are staged, so a failure leaves
//! the previous pair in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::error::{RepogenError, Result};
use crate::request::GeneratedFile;

/// Directories searched by [`find_gen_dir`], in priority order.
pub const GEN_DIR_CANDIDATES: &[&str] = &["gen", "generated", "src/model"];

/// Returns the first existing generated-code directory under `root`.
pub fn find_gen_dir(root: &Path) -> Result<PathBuf> {
    GEN_DIR_CANDIDATES
        .iter()
        .map(|c| root.join(c))
        .find(|p| p.is_dir())
        .ok_or_else(|| {
            RepogenError::io(
                root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("none of {GEN_DIR_CANDIDATES:?} exists"),
                ),
            )
        })
}

fn stage(path: &Path, content: &str) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| RepogenError::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| RepogenError::io(parent, e))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| RepogenError::io(temp.path(), e))?;
    temp.flush().map_err(|e| RepogenError::io(temp.path(), e))?;
    Ok(temp)
}

/// Writes one file atomically, creating parent directories.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp = stage(path, content)?;
    temp.persist(path)?;
    Ok(())
}

/// Writes a group of files, staging all of them before persisting any.
#[instrument(skip_all, fields(count = files.len()))]
pub fn write_all_or_nothing(files: &[GeneratedFile]) -> Result<()> {
    let staged = files
        .iter()
        .map(|f| Ok((stage(Path::new(&f.name), &f.content)?, &f.name)))
        .collect::<Result<Vec<_>>>()?;

    for (temp, name) in staged {
        debug!(file = %name, "persisting");
        temp.persist(name)?;
    }
    info!("generated files written");
    Ok(())
}
