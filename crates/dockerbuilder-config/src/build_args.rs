use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// `DOCKER_BUILD_ARGS` のビルド引数（JSON オブジェクトの記述順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArguments {
    entries: Vec<(String, String)>,
}

impl BuildArguments {
    /// JSON オブジェクト文字列から解析
    ///
    /// 文字列以外の値は JSON 表現のまま使う（`8080` -> `"8080"`）
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidBuildArgs(e.to_string()))?;

        let Value::Object(map) = value else {
            return Err(ConfigError::InvalidBuildArgs(
                "JSON object expected".to_string(),
            ));
        };

        let entries = map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Docker API に渡す形式
    pub fn to_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_insertion_order() {
        let args = BuildArguments::from_json(r#"{"ZETA":"1","ALPHA":"2","MID":"3"}"#).unwrap();
        let keys: Vec<&str> = args.keys().collect();
        assert_eq!(keys, vec!["ZETA", "ALPHA", "MID"]);
    }

    #[test]
    fn test_non_string_values() {
        let args = BuildArguments::from_json(r#"{"PORT":8080,"DEBUG":true,"EMPTY":null}"#).unwrap();
        let pairs: Vec<(&str, &str)> = args.iter().collect();
        assert_eq!(
            pairs,
            vec![("PORT", "8080"), ("DEBUG", "true"), ("EMPTY", "")]
        );
    }

    #[test]
    fn test_empty_object() {
        let args = BuildArguments::from_json("{}").unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(BuildArguments::from_json(r#"["PORT"]"#).is_err());
        assert!(BuildArguments::from_json("not json").is_err());
    }

    #[test]
    fn test_to_map() {
        let args = BuildArguments::from_json(r#"{"PORT":"8080"}"#).unwrap();
        assert_eq!(args.to_map().get("PORT").map(String::as_str), Some("8080"));
    }
}
