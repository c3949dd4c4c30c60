//! Nested response traversal
//!
//! Walks a decoded response one key at a time. Only mappings can be
//! descended into; there is no wildcard or array index support.

use crate::error::PathError;
use serde_json::{Map, Value};

/// Resolve `path` against `root`.
///
/// Every segment but the last must name a nested mapping. An empty path
/// resolves to nothing and reports an empty segment.
pub fn traverse<'a, S: AsRef<str>>(
    root: &'a Map<String, Value>,
    path: &[S],
) -> Result<&'a Value, PathError> {
    match path {
        [] => Err(PathError::NotFound(String::new())),
        [last] => root
            .get(last.as_ref())
            .ok_or_else(|| PathError::NotFound(last.as_ref().to_string())),
        [head, rest @ ..] => match root.get(head.as_ref()) {
            Some(Value::Object(inner)) => traverse(inner, rest),
            _ => Err(PathError::NotFound(head.as_ref().to_string())),
        },
    }
}

/// Split a slash-delimited traversal path, dropping empty segments.
pub fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity() -> Map<String, Value> {
        match json!({
            "health_status": "green",
            "reporting": true,
            "application_summary": {
                "response_time": 13.37,
                "host_count": 2
            },
            "links": ["a", "b"]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_single_segment() {
        let root = entity();
        assert_eq!(traverse(&root, &["health_status"]).unwrap(), &json!("green"));
        assert_eq!(traverse(&root, &["reporting"]).unwrap(), &json!(true));
    }

    #[test]
    fn test_nested_segments() {
        let root = entity();
        let value = traverse(&root, &split("application_summary/response_time")).unwrap();
        assert_eq!(value.as_f64(), Some(13.37));
    }

    #[test]
    fn test_missing_leaf_names_the_leaf() {
        let root = entity();
        let err = traverse(&root, &["application_summary", "error_rate"]).unwrap_err();
        assert_eq!(err, PathError::NotFound("error_rate".to_string()));
    }

    #[test]
    fn test_scalar_intermediate_names_the_intermediate() {
        let root = entity();
        let err = traverse(&root, &["health_status", "anything"]).unwrap_err();
        assert_eq!(err, PathError::NotFound("health_status".to_string()));

        // Lists are not descended into either
        let err = traverse(&root, &["links", "0"]).unwrap_err();
        assert_eq!(err, PathError::NotFound("links".to_string()));
    }

    #[test]
    fn test_missing_intermediate() {
        let root = entity();
        let err = traverse(&root, &["end_user_summary", "apdex_score"]).unwrap_err();
        assert_eq!(err.to_string(), "Path element not found: end_user_summary");
    }

    #[test]
    fn test_split_ignores_stray_slashes() {
        assert_eq!(split("a/b"), vec!["a", "b"]);
        assert_eq!(split("/a//b/"), vec!["a", "b"]);
        assert!(split("").is_empty());
    }
}
