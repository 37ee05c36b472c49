// hive-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for hive.toml documentation.
// Purpose: Keep config docs in sync with the schema.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! Generates reference documentation for `hive.toml` from the canonical
//! configuration schema. The output is deterministic: two calls on an
//! unchanged schema always produce byte-identical text, which lets
//! [`verify_config_docs`] catch drift between a committed doc and the
//! schema it claims to describe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::schema::config_schema;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default output path for generated configuration docs.
const DOCS_PATH: &str = "Docs/configuration/hive.toml.md";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when generating or verifying config docs.
#[derive(Debug, Error)]
pub enum DocsError {
    /// I/O failure while reading or writing docs.
    #[error("docs io error: {0}")]
    Io(String),
    /// Schema traversal or rendering error.
    #[error("docs schema error: {0}")]
    Schema(String),
    /// Generated docs do not match the committed file.
    #[error("docs drift: {0}")]
    Drift(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Generates the configuration markdown documentation.
///
/// # Errors
///
/// Returns [`DocsError`] when the schema cannot be rendered.
pub fn config_docs_markdown() -> Result<String, DocsError> {
    let schema = config_schema();
    let mut out = String::new();

    out.push_str("<!--\n");
    out.push_str("Docs/configuration/hive.toml.md\n");
    out.push_str("============================================================================\n");
    out.push_str("Document: HiveForge Engine Configuration\n");
    out.push_str("Description: Reference for hive.toml configuration fields.\n");
    out.push_str("Generated: This file is auto-generated; do not edit manually.\n");
    out.push_str("============================================================================\n");
    out.push_str("-->\n\n");

    out.push_str("# hive.toml Configuration\n\n");
    out.push_str("## Overview\n\n");
    out.push_str(
        "`hive.toml` configures the vault path, governance tunables, default LLM\n\
         collaborator settings, control-surface auth, policy gate, and Sentinel\n\
         thresholds for one HiveForge engine. All inputs are validated and fail\n\
         closed on errors.\n\n",
    );

    out.push_str("## Top-Level Sections\n\n");

    let properties = schema["properties"].as_object().ok_or_else(|| {
        DocsError::Schema("schema root is missing a properties object".to_string())
    })?;

    for (name, fragment) in properties {
        write!(out, "### `{name}`\n\n").map_err(|err| DocsError::Schema(err.to_string()))?;
        render_section(&mut out, fragment)?;
        out.push('\n');
    }

    Ok(out)
}

/// Renders one top-level section's field table from its schema fragment.
fn render_section(out: &mut String, fragment: &Value) -> Result<(), DocsError> {
    let Some(properties) = fragment.get("properties").and_then(Value::as_object) else {
        out.push_str(&format!("- type: `{}`\n", fragment.get("type").unwrap_or(&Value::Null)));
        return Ok(());
    };

    out.push_str("| Field | Type |\n|---|---|\n");
    for (field, spec) in properties {
        let field_type = spec.get("type").map_or_else(|| "object".to_string(), |t| t.to_string());
        writeln!(out, "| `{field}` | {field_type} |").map_err(|err| DocsError::Schema(err.to_string()))?;
    }
    Ok(())
}

/// Writes the generated docs to `path`, or [`DOCS_PATH`] if `None`.
///
/// # Errors
///
/// Returns [`DocsError`] when rendering or file output fails.
pub fn write_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    fs::write(path, content.as_bytes()).map_err(|err| DocsError::Io(err.to_string()))
}

/// Verifies the on-disk docs at `path` (or [`DOCS_PATH`]) match the
/// generated output.
///
/// # Errors
///
/// Returns [`DocsError`] when the docs drift from the schema.
pub fn verify_config_docs(path: Option<&Path>) -> Result<(), DocsError> {
    let path = path.unwrap_or_else(|| Path::new(DOCS_PATH));
    let content = config_docs_markdown()?;
    let existing = fs::read_to_string(path).map_err(|err| DocsError::Io(err.to_string()))?;
    if existing != content {
        return Err(DocsError::Drift(format!("docs mismatch: {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_docs_are_deterministic() {
        let first = config_docs_markdown().expect("render once");
        let second = config_docs_markdown().expect("render twice");
        assert_eq!(first, second);
    }

    #[test]
    fn generated_docs_mention_every_top_level_section() {
        let docs = config_docs_markdown().expect("render");
        for heading in ["vault_path", "governance", "llm", "auth", "policy", "sentinel"] {
            assert!(docs.contains(heading), "docs missing section: {heading}");
        }
    }

    #[test]
    fn verify_detects_drift_against_a_stale_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hive.toml.md");
        fs::write(&path, "stale content").expect("write");
        assert!(verify_config_docs(Some(&path)).is_err());
    }

    #[test]
    fn verify_accepts_freshly_written_docs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hive.toml.md");
        write_config_docs(Some(&path)).expect("write");
        assert!(verify_config_docs(Some(&path)).is_ok());
    }
}
