//! Rendering a [`ModelDefinition`] back into directive text.

use std::fmt::Write;

use crate::types::{ModelDefinition, ParamValue};

/// Render a definition as the document sent to the server's create endpoint.
///
/// Parameters are written in declaration order. List values are written as
/// one `PARAMETER` line per item, which is how the server expects repeated
/// keys such as `stop`.
pub fn write_modelfile(def: &ModelDefinition) -> String {
    let mut output = String::new();

    writeln!(output, "FROM {}", def.from.trim()).unwrap();

    for (key, value) in &def.parameters {
        match value {
            ParamValue::List(items) => {
                for item in items {
                    writeln!(output, "PARAMETER {} {}", key, quote_if_needed(item)).unwrap();
                }
            }
            ParamValue::Text(text) => {
                writeln!(output, "PARAMETER {} {}", key, quote_if_needed(text)).unwrap();
            }
            ParamValue::Number(_) => {
                writeln!(output, "PARAMETER {} {}", key, value).unwrap();
            }
        }
    }

    let system = def.system.trim();
    if !system.is_empty() {
        writeln!(output, "SYSTEM \"\"\"\n{}\n\"\"\"", system).unwrap();
    }

    output
}

fn quote_if_needed(value: &str) -> String {
    let value = value.trim();
    let already_quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if !already_quoted && value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}
