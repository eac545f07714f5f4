//! Dataset directory enumeration.

use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Lists the regular files in `dir`, sorted by name.
///
/// When `extension` is given only files with that extension (compared
/// case-insensitively, without the dot) are returned. Entries whose names
/// are not valid UTF-8 are skipped.
///
/// # Errors
/// Returns [`Error::NotFound`] if `dir` is not an existing directory.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: Option<&str>) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(ext) = extension {
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext));
            if !matches {
                continue;
            }
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort_unstable();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_list_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ID_b.dcm", "ID_a.DCM", "notes.txt", "ID_c.dcm"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.dcm")).unwrap();

        let dcm = list_files(dir.path(), Some("dcm")).unwrap();
        assert_eq!(dcm, vec!["ID_a.DCM", "ID_b.dcm", "ID_c.dcm"]);

        let all = list_files(dir.path(), None).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_list_files_missing_dir() {
        let result = list_files("/nonexistent/stage_2_train", Some("dcm"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
