use anyhow::{Context as _, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

pub const DOCUMENT_FILE: &str = ".natrium.yml";

pub fn document_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DOCUMENT_FILE)
}

/// Read the raw document text; the lock checksums this before parsing.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot find {}", path.display()))
}

pub fn parse_document(text: &str, path: &Path) -> Result<Value> {
    let doc: Value = serde_yaml::from_str(text)
        .with_context(|| format!("Error parsing {}", path.display()))?;
    Ok(doc)
}

pub fn load_document(path: &Path) -> Result<Value> {
    let text = read_document(path)?;
    parse_document(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_yaml_document_in_order() {
        let temp = TempDir::new().unwrap();
        let path = document_path(temp.path());
        fs::write(&path, "environments: [dev]\nzeta: 1\nalpha: 2\n").unwrap();

        let doc = load_document(&path).unwrap();
        let keys: Vec<_> = doc
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["environments", "zeta", "alpha"]);
    }

    #[test]
    fn missing_document_names_the_path() {
        let temp = TempDir::new().unwrap();
        let err = load_document(&document_path(temp.path())).unwrap_err();
        assert!(err.to_string().contains(".natrium.yml"));
    }

    #[test]
    fn malformed_document_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = document_path(temp.path());
        fs::write(&path, "environments: [dev\n").unwrap();
        assert!(load_document(&path).is_err());
    }
}
