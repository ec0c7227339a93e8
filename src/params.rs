use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Result, TesseractError};

/// Raw engine variable overrides, passed to tesseract as `-c key=value`.
///
/// Keys are unique and iterate in the order they were first set; setting an
/// existing key replaces its value in place. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBag {
    parameters: Vec<(String, String)>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        match self.position(&key) {
            Some(idx) => self.parameters[idx].1 = value,
            None => self.parameters.push((key, value)),
        }
        self
    }

    /// By-value form of [`set`](Self::set) for building a bag inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        self.position(key)
            .map(|idx| self.parameters[idx].1.as_str())
            .ok_or_else(|| TesseractError::NotFound(key.to_string()))
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Result<String> {
        self.position(key)
            .map(|idx| self.parameters.remove(idx).1)
            .ok_or_else(|| TesseractError::NotFound(key.to_string()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.parameters.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flatten into `["-c", "k1=v1", "-c", "k2=v2", ...]`.
    pub fn to_arguments(&self) -> Vec<String> {
        let mut arguments = Vec::with_capacity(self.parameters.len() * 2);

        for (key, value) in &self.parameters {
            arguments.push("-c".to_string());
            arguments.push(format!("{}={}", key, value));
        }

        arguments
    }

    /// Split a `key=value` string as typed on a command line.
    ///
    /// Only the first `=` separates; the value may contain more of them.
    pub fn parse_pair(input: &str) -> Result<(String, String)> {
        match input.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(TesseractError::Argument(format!(
                "expected key=value, got ( {} )",
                input
            ))),
        }
    }
}

impl Serialize for ParameterBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for ParameterBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BagVisitor;

        impl<'de> Visitor<'de> for BagVisitor {
            type Value = ParameterBag;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of engine variable names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut bag = ParameterBag::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    bag.set(key, value);
                }
                Ok(bag)
            }
        }

        deserializer.deserialize_map(BagVisitor)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (key, value) in iter {
            bag.set(key, value);
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_arguments_per_entry() {
        let mut bag = ParameterBag::new();
        bag.set("tessedit_char_whitelist", "0123456789")
            .set("preserve_interword_spaces", "1");

        let args = bag.to_arguments();
        assert_eq!(args.len(), 4);
        assert_eq!(
            args,
            vec![
                "-c",
                "tessedit_char_whitelist=0123456789",
                "-c",
                "preserve_interword_spaces=1",
            ]
        );
    }

    #[test]
    fn test_set_overwrites() {
        let bag = ParameterBag::new().with("load_system_dawg", "0").with("load_system_dawg", "1");

        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("load_system_dawg").unwrap(), "1");
    }

    #[test]
    fn test_overwrite_keeps_first_position() {
        let bag = ParameterBag::new()
            .with("textord_heavy_nr", "1")
            .with("load_system_dawg", "0")
            .with("textord_heavy_nr", "0");

        let keys: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["textord_heavy_nr", "load_system_dawg"]);
        assert_eq!(
            bag.to_arguments(),
            vec!["-c", "textord_heavy_nr=0", "-c", "load_system_dawg=0"]
        );
    }

    #[test]
    fn test_removed_key_is_not_emitted() {
        let mut bag: ParameterBag = [("a", "1"), ("b", "2")].into_iter().collect();

        assert_eq!(bag.remove("a").unwrap(), "1");
        assert!(!bag.contains_key("a"));
        assert_eq!(bag.to_arguments(), vec!["-c", "b=2"]);
    }

    #[test]
    fn test_missing_key() {
        let mut bag = ParameterBag::new();

        assert!(matches!(bag.get("nope"), Err(TesseractError::NotFound(k)) if k == "nope"));
        assert!(matches!(bag.remove("nope"), Err(TesseractError::NotFound(_))));
    }

    #[test]
    fn test_empty_bag_has_no_arguments() {
        assert!(ParameterBag::new().to_arguments().is_empty());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            ParameterBag::parse_pair("user_defined_dpi=300").unwrap(),
            ("user_defined_dpi".to_string(), "300".to_string())
        );
        assert_eq!(
            ParameterBag::parse_pair("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(ParameterBag::parse_pair("novalue").is_err());
        assert!(ParameterBag::parse_pair("=1").is_err());
    }

    #[test]
    fn test_serializes_as_object() {
        let bag = ParameterBag::new().with("debug_file", "/dev/null");
        let json = serde_json::to_string(&bag).unwrap();
        assert_eq!(json, r#"{"debug_file":"/dev/null"}"#);
    }

    #[test]
    fn test_deserializes_in_document_order() {
        let bag: ParameterBag =
            serde_json::from_str(r#"{"zeta": "1", "alpha": "2", "zeta": "3"}"#).unwrap();

        assert_eq!(bag.len(), 2);
        assert_eq!(bag.to_arguments(), vec!["-c", "zeta=3", "-c", "alpha=2"]);
        assert!(serde_json::from_str::<ParameterBag>(r#"["a"]"#).is_err());
    }
}
