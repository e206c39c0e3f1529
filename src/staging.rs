//! Per-attempt scratch directories. A [`TempDir`] removes itself and
//! everything inside it when dropped, on every exit path.

use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Create a fresh staging directory under `root`, or the system temp dir.
pub fn staging_dir(root: Option<&Path>, prefix: &str) -> io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Reduce a display name to a single safe path component.
pub fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "attachment".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let dir = staging_dir(Some(root.path()), "attempt-").unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        std::fs::write(path.join("file.bin"), b"data").unwrap();
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\docs\\memo.docx"), "memo.docx");
        assert_eq!(safe_file_name(".."), "attachment");
        assert_eq!(safe_file_name(""), "attachment");
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
    }
}
