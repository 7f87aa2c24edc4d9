//! JSON documents on disk.

use crate::Result;
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

const LOG_TARGET: &str = "     store";

/// Load a document, `Ok(None)` when the file does not exist.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::trace!(target: LOG_TARGET, "No document at '{}'", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e).into_app_err_with(|| format!("unable to open file '{}'", path.display())),
    };

    let data = serde_json::from_reader(BufReader::new(file)).into_app_err_with(|| format!("unable to parse file '{}'", path.display()))?;
    Ok(Some(data))
}

/// Save a document, creating parent directories as needed.
///
/// The document is written next to its destination and renamed into place, so readers never
/// see a partial file.
pub fn save<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).into_app_err_with(|| format!("unable to create file '{}'", tmp_path.display()))?;
    let mut writer = BufWriter::new(file);

    #[cfg(debug_assertions)]
    let result = serde_json::to_writer_pretty(&mut writer, data);
    #[cfg(not(debug_assertions))]
    let result = serde_json::to_writer(&mut writer, data);

    result.into_app_err_with(|| format!("unable to write file '{}'", tmp_path.display()))?;
    writer
        .flush()
        .into_app_err_with(|| format!("unable to flush file '{}'", tmp_path.display()))?;
    drop(writer);

    fs::rename(&tmp_path, path).into_app_err_with(|| format!("unable to move '{}' into place", path.display()))?;
    Ok(())
}

/// Turn an arbitrary string into a safe file name component.
pub fn sanitize_file_name(s: &str) -> String {
    s.replace("..", "__").replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        value: u64,
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("doc.json");

        let doc = Doc { name: "x".into(), value: 7 };
        save(&doc, &path).unwrap();

        let loaded: Option<Doc> = load(&path).unwrap();
        assert_eq!(loaded, Some(doc));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loaded: Option<Doc> = load(&temp_dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();

        let err = load::<Doc>(&path).unwrap_err();
        assert!(err.to_string().contains("unable to parse"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("abc123"), "abc123");
        assert_eq!(sanitize_file_name("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_file_name("a:b*c"), "a_b_c");
    }
}
