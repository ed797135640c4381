//! Model definition documents ("Modelfiles").
//!
//! A model definition is a small directive document describing how to derive
//! one model from another:
//!
//! ```text
//! FROM qwen2:7b
//! PARAMETER temperature 0.7
//! PARAMETER num_ctx 4096
//! SYSTEM """
//! You are a terse assistant.
//! """
//! ```
//!
//! The parser is deliberately forgiving. Definitions come back from the
//! server in whatever shape the user last wrote them, so parsing never fails:
//! missing directives produce empty values and unknown directives are ignored.

mod parser;
mod types;
mod writer;

pub use parser::{parse_modelfile, parse_optional, parse_parameter_listing};
pub use types::{default_parameters, ModelDefinition, ParamValue, Parameters};
pub use writer::write_modelfile;

/// System prompt used when an agent is saved without one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly AI assistant.";
