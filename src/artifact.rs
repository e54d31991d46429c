use crate::error::{CatrunError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Shape of the categorizer output the runner relies on. Everything beyond
/// the article list is owned by the categorizer and passed through untouched.
#[derive(Debug, Deserialize)]
pub struct CategorizedArticles {
    #[serde(default)]
    pub categorization_timestamp: Option<String>,
    #[serde(default)]
    pub articles: Vec<Value>,
}

/// What `inspect` learned about the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSummary {
    pub article_count: usize,
    pub timestamp: Option<String>,
}

/// Parse the output artifact and summarize it.
///
/// Accepts both shapes the categorizer has written historically: an object
/// with an `articles` array, and a bare top-level array. A subprocess can
/// exit 0 after writing garbage; this is where that gets caught.
pub fn inspect(path: &Path) -> Result<ArtifactSummary> {
    if !path.exists() {
        return Err(CatrunError::OutputValidation(format!(
            "'{}' was not produced",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| {
        CatrunError::OutputValidation(format!("'{}' is not valid JSON: {e}", path.display()))
    })?;

    match value {
        Value::Array(items) => Ok(ArtifactSummary {
            article_count: items.len(),
            timestamp: None,
        }),
        Value::Object(_) => {
            let doc: CategorizedArticles = serde_json::from_value(value)?;
            Ok(ArtifactSummary {
                article_count: doc.articles.len(),
                timestamp: doc.categorization_timestamp,
            })
        }
        other => Err(CatrunError::OutputValidation(format!(
            "'{}' has unexpected top-level {}; expected an object or array",
            path.display(),
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn accepts_object_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categorized_articles.json");
        fs::write(
            &path,
            r#"{"categorization_timestamp": "2025-01-02T03:04:05", "articles": [{"category": "tech"}]}"#,
        )
        .unwrap();

        let summary = inspect(&path).unwrap();
        assert_eq!(summary.article_count, 1);
        assert_eq!(summary.timestamp.as_deref(), Some("2025-01-02T03:04:05"));
    }

    #[test]
    fn accepts_bare_array_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categorized_articles.json");
        fs::write(&path, r#"[{"category": "tech"}, {"category": "health"}]"#).unwrap();

        let summary = inspect(&path).unwrap();
        assert_eq!(summary.article_count, 2);
        assert!(summary.timestamp.is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categorized_articles.json");
        fs::write(&path, "{\"articles\": [").unwrap();

        let err = inspect(&path).unwrap_err();
        assert!(matches!(err, CatrunError::OutputValidation(_)));
    }

    #[test]
    fn rejects_unexpected_top_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categorized_articles.json");
        fs::write(&path, "\"just a string\"").unwrap();

        let err = inspect(&path).unwrap_err();
        assert!(matches!(err, CatrunError::OutputValidation(_)));
    }

    #[test]
    fn missing_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        let err = inspect(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CatrunError::OutputValidation(_)));
    }
}
