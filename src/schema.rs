//! Workflow document loading and schema validation
//!
//! ## Design
//!
//! - Documents are YAML (any extension) or JSON (`.json`), decoded into `serde_json::Value`
//! - Structure is checked against an embedded JSON Schema before typed decoding
//! - The first schema violation is reported with its location, e.g. `steps[0].run`;
//!   callers add their own context to the message

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{LoadError, WorkflowValidationError};

/// Embedded schema JSON (compiled at build time)
const SCHEMA_JSON: &str = include_str!("../schemas/workflow.schema.json");

/// Global schema validator instance (lazy initialization)
static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

fn schema_validator() -> Result<&'static Validator, WorkflowValidationError> {
    let compiled = VALIDATOR.get_or_init(|| {
        let schema: Value = serde_json::from_str(SCHEMA_JSON)
            .map_err(|e| format!("Failed to parse schema JSON: {}", e))?;
        Validator::new(&schema).map_err(|e| format!("Failed to compile schema: {}", e))
    });

    compiled
        .as_ref()
        .map_err(|e| WorkflowValidationError::new(e.clone()))
}

/// Read and decode a workflow document
pub fn load_workflow_file(path: impl AsRef<Path>) -> Result<Value, LoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &text)
}

/// Decode document text; `path` picks the format and labels errors
pub fn parse_document(path: &Path, text: &str) -> Result<Value, LoadError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let document: Value = if is_json {
        serde_json::from_str(text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?
    };

    if !document.is_object() {
        return Err(LoadError::NotAMapping {
            path: path.to_path_buf(),
        });
    }
    Ok(document)
}

/// Check document structure against the workflow schema
pub fn validate_workflow(document: &Value) -> Result<(), WorkflowValidationError> {
    let validator = schema_validator()?;

    match validator.iter_errors(document).next() {
        None => Ok(()),
        Some(error) => {
            let schema_path = dotted_path(&error.instance_path.to_string());
            Err(WorkflowValidationError::with_path(error.to_string(), schema_path))
        }
    }
}

/// `/steps/0/run` -> `steps[0].run`
fn dotted_path(pointer: &str) -> String {
    let mut out = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.chars().all(|c| c.is_ascii_digit()) {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&segment);
        }
    }
    out
}
