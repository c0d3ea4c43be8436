//! Atomic file writes.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write `contents` to `path` via a sibling `.tmp` file and a rename, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(tmp, path).with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}
