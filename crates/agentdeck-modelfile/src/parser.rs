//! Best-effort extraction of `FROM`, `SYSTEM` and `PARAMETER` directives.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ModelDefinition, ParamValue, Parameters};

lazy_static! {
    static ref SYSTEM_TRIPLE: Regex =
        Regex::new(r#"SYSTEM\s+"""\s*([\s\S]*?)\s*""""#).expect("valid SYSTEM block pattern");
    static ref SYSTEM_SINGLE: Regex =
        Regex::new(r#"SYSTEM\s+"([\s\S]*?)""#).expect("valid SYSTEM line pattern");
    static ref PARAMETER: Regex =
        Regex::new(r"(?i)^\s*PARAMETER\s+(\S+)\s+(.+?)\s*$").expect("valid PARAMETER pattern");
}

/// Parse a model definition document.
///
/// Never fails. Directives that are missing or malformed leave the matching
/// field empty:
///
/// - `from` is the remainder of the first line starting with `FROM `
///   (case-insensitive). Later `FROM` lines are ignored.
/// - `system` is the body of the first `SYSTEM """..."""` block, falling back
///   to a `SYSTEM "..."` string. Surrounding whitespace is trimmed.
/// - every `PARAMETER <key> <value>` line is recorded; when a key repeats the
///   last occurrence wins.
pub fn parse_modelfile(text: &str) -> ModelDefinition {
    let mut def = ModelDefinition::default();
    if text.trim().is_empty() {
        return def;
    }

    def.from = parse_from(text).unwrap_or_default();
    def.system = parse_system(text).unwrap_or_default();

    for line in text.split('\n') {
        if let Some(caps) = PARAMETER.captures(line) {
            def.parameters
                .insert(caps[1].to_string(), ParamValue::coerce(&caps[2]));
        }
    }

    def
}

/// Parse a definition that may be absent altogether.
pub fn parse_optional(text: Option<&str>) -> ModelDefinition {
    text.map(parse_modelfile).unwrap_or_default()
}

/// Parse the `parameters` listing of a show response: one `key value` pair
/// per line, aligned with spaces. Repeated keys keep the last value.
pub fn parse_parameter_listing(text: &str) -> Parameters {
    let mut params = Parameters::new();
    for line in text.lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once(char::is_whitespace) {
            let value = value.trim();
            if !value.is_empty() {
                params.insert(key.to_string(), ParamValue::coerce(value));
            }
        }
    }
    params
}

fn parse_from(text: &str) -> Option<String> {
    text.split('\n')
        .map(str::trim)
        .find(|line| {
            line.get(..5)
                .map(|head| head.eq_ignore_ascii_case("FROM "))
                .unwrap_or(false)
        })
        .map(|line| line[5..].trim().to_string())
}

fn parse_system(text: &str) -> Option<String> {
    SYSTEM_TRIPLE
        .captures(text)
        .or_else(|| SYSTEM_SINGLE.captures(text))
        .map(|caps| caps[1].trim().to_string())
}
