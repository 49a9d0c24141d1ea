//! Shared helpers: text shaping and atomic file writes.

pub mod text;

use std::io::Write;
use std::path::Path;

/// Writes `contents` to `path` through a temp file in the same directory
/// followed by a rename, so the destination never holds a partial write.
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Randomized temp name so a concurrent writer cannot collide with us.
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{suffix:016x}"));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;

    if let Err(e) = file.write_all(contents).and_then(|_| file.sync_all()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    drop(file);

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = std::env::temp_dir().join("brief_atomic_write_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("target.json");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = std::env::temp_dir().join("brief_atomic_write_clean");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("target.json");

        atomic_write(&path, b"data").unwrap();

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["target.json".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
