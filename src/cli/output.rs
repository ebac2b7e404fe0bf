//! Document output for `ops get`
//!
//! Supports a console layout (one block per document) and JSON lines.

use crate::store::Document;
use serde_json::{Value, json};
use std::io::{self, Write};

const SEPARATOR_WIDTH: usize = 50;

/// Output mode for printed documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
}

/// Print `docs` to `out` in `mode`
pub fn print_documents(out: &mut dyn Write, docs: &[Document], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Console => {
            let separator = "-".repeat(SEPARATOR_WIDTH);
            writeln!(out, "{}", separator)?;
            for doc in docs {
                writeln!(out, "Document ID: {}", doc.id)?;
                for (key, value) in &doc.fields {
                    match value {
                        Value::Object(nested) => {
                            writeln!(out, "{}:", key)?;
                            for (k, v) in nested {
                                writeln!(out, "  {}: {}", k, display_value(v))?;
                            }
                        }
                        other => writeln!(out, "{}: {}", key, display_value(other))?,
                    }
                }
                writeln!(out, "{}", separator)?;
            }
        }
        OutputMode::Json => {
            for doc in docs {
                let line = json!({ "id": doc.id, "fields": doc.fields });
                writeln!(out, "{}", line)?;
            }
        }
    }
    out.flush()
}

/// Strings print bare, everything else as compact JSON
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
