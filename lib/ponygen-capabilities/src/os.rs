use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::Result;

/// Writes `contents` to `path` through a temporary file in the same directory,
/// so the destination is either untouched or complete.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory)?;

    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_parent_directories_and_replaces_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("models.py");

        write_atomic(&path, "first\n").expect("first write");
        write_atomic(&path, "second\n").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read back"), "second\n");
        let leftovers = fs::read_dir(path.parent().expect("parent")).expect("list").count();
        assert_eq!(leftovers, 1);
    }
}
