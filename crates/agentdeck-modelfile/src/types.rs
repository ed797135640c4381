//! Model definition types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Generation parameters keyed by name, in the order they were declared.
pub type Parameters = IndexMap<String, ParamValue>;

/// A generation parameter value.
///
/// Values that look like numbers are kept as numbers so they round-trip
/// through JSON the way the server reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    /// Several values for one key, e.g. multiple stop sequences.
    List(Vec<String>),
}

impl ParamValue {
    /// Coerce raw directive text into a value: finite numbers become
    /// [`ParamValue::Number`], everything else is kept as trimmed text.
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(raw.to_string()),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            ParamValue::List(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Integral values print without a trailing ".0" (num_ctx 2048, not 2048.0).
            ParamValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

/// The fields extracted from a model definition document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Parent model reference from the `FROM` directive.
    pub from: String,
    /// System prompt from the `SYSTEM` directive.
    pub system: String,
    /// `PARAMETER` directives.
    pub parameters: Parameters,
}

impl ModelDefinition {
    /// Create a definition deriving from `from`.
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Check whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.system.is_empty() && self.parameters.is_empty()
    }

    /// Render this definition as a directive document.
    pub fn to_modelfile(&self) -> String {
        crate::writer::write_modelfile(self)
    }
}

/// Parameter values an agent starts with before the user changes anything.
pub fn default_parameters() -> Parameters {
    let mut params = Parameters::new();
    params.insert("temperature".to_string(), ParamValue::Number(0.8));
    params.insert("top_p".to_string(), ParamValue::Number(0.9));
    params.insert("top_k".to_string(), ParamValue::Number(40.0));
    params.insert("repeat_penalty".to_string(), ParamValue::Number(1.1));
    params.insert("num_ctx".to_string(), ParamValue::Number(2048.0));
    params.insert("seed".to_string(), ParamValue::Number(0.0));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numbers_and_text() {
        assert_eq!(ParamValue::coerce("0.7"), ParamValue::Number(0.7));
        assert_eq!(ParamValue::coerce(" 40 "), ParamValue::Number(40.0));
        assert_eq!(ParamValue::coerce("1e3"), ParamValue::Number(1000.0));
        assert_eq!(
            ParamValue::coerce("<|im_end|>"),
            ParamValue::Text("<|im_end|>".to_string())
        );
        // Non-finite spellings stay textual.
        assert_eq!(ParamValue::coerce("inf"), ParamValue::Text("inf".to_string()));
        assert_eq!(ParamValue::coerce("NaN"), ParamValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(ParamValue::Number(2048.0).to_string(), "2048");
        assert_eq!(ParamValue::Number(0.8).to_string(), "0.8");
        assert_eq!(ParamValue::Number(-1.0).to_string(), "-1");
    }

    #[test]
    fn test_json_shape_is_untagged() {
        let params = default_parameters();
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.starts_with(r#"{"temperature":0.8,"top_p":0.9"#));

        let back: Parameters = serde_json::from_str(r#"{"stop":["a","b"],"mirostat":"x"}"#).unwrap();
        assert_eq!(
            back["stop"],
            ParamValue::List(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(back["mirostat"], ParamValue::Text("x".to_string()));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(ParamValue::Text("1.5".into()).as_f64(), Some(1.5));
        assert_eq!(ParamValue::Text("abc".into()).as_f64(), None);
        assert_eq!(ParamValue::List(vec![]).as_f64(), None);
    }
}
