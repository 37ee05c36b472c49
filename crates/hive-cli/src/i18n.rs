// hive-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Provides message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for future localization support.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The HiveForge CLI stores user-facing strings in a small translation
//! catalog to enforce consistent messaging and to prepare for future
//! locales. All runtime output should be routed through the
//! [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"run_id"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self { key, value: value.into() }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries loaded into the localized message bundle.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "hive {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("vault.open_failed", "Failed to open vault at {path}: {error}"),
    ("auth.required", "A control-surface auth key is required but was not supplied."),
    ("auth.mismatch", "The supplied auth key does not match the configured key."),
    ("engine.command_failed", "Command failed: {error}"),
    ("hive.created", "hive {hive_id} created (status: {status})"),
    ("hive.closed", "hive {hive_id} closed"),
    ("colony.created", "colony {colony_id} created (status: {status})"),
    ("colony.started", "colony {colony_id} started"),
    ("colony.completed", "colony {colony_id} completed"),
    ("run.started", "run {run_id} started (state: {state})"),
    ("run.completed", "run {run_id} completed"),
    ("run.aborted", "run {run_id} aborted"),
    ("run.demo_outcome", "demo run {run_id} finished: {outcome}"),
    ("task.created", "task {task_id} created (state: {state})"),
    ("task.assigned", "task {task_id} assigned to {assignee}"),
    ("task.progressed", "task {task_id} progress: {progress}%"),
    ("task.completed", "task {task_id} completed"),
    ("task.failed", "task {task_id} failed: {error}"),
    ("requirement.created", "requirement {requirement_id} created (state: {state})"),
    ("requirement.resolved", "requirement {requirement_id} resolved (state: {state})"),
    ("heartbeat.recorded", "heartbeat recorded for run {run_id} at {recorded_at}"),
];

/// Lazily-built lookup table for catalog entries.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

/// Renders a catalog entry, substituting every `{key}` placeholder with the
/// matching [`MessageArg`]. Falls back to the raw key (with no
/// substitution) if the key is unknown, and leaves unmatched placeholders
/// untouched rather than panicking.
#[must_use]
pub fn translate(key: &str, args: &[MessageArg]) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    let mut rendered = template.to_string();
    for arg in args {
        rendered = rendered.replace(&format!("{{{}}}", arg.key), &arg.value);
    }
    rendered
}

/// Builds a [`MessageArg`] list and calls [`translate`] in one expression.
///
/// ```ignore
/// t!("run.started", run_id = run_id, state = state)
/// ```
#[macro_export]
macro_rules! t {
    ($key:expr $(,)?) => {
        $crate::i18n::translate($key, &[])
    };
    ($key:expr, $($arg:ident = $value:expr),+ $(,)?) => {
        $crate::i18n::translate(
            $key,
            &[$($crate::i18n::MessageArg::new(stringify!($arg), $value.to_string())),+],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key_renders_with_substitution() {
        let rendered = translate("run.started", &[MessageArg::new("run_id", "run-1"), MessageArg::new("state", "running")]);
        assert_eq!(rendered, "run run-1 started (state: running)");
    }

    #[test]
    fn unknown_key_falls_back_to_the_key_itself() {
        assert_eq!(translate("no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn macro_formats_multiple_arguments() {
        let rendered = t!("task.progressed", task_id = "task-1", progress = 42);
        assert_eq!(rendered, "task task-1 progress: 42%");
    }

    #[test]
    fn unmatched_placeholder_is_left_untouched() {
        let rendered = translate("output.write_failed", &[MessageArg::new("stream", "stdout")]);
        assert_eq!(rendered, "Failed to write to stdout: {error}");
    }
}
