// hive-collab/src/lib.rs
// ============================================================================
// Module: Hive Collab Library
// Description: Public API surface for the external collaborator adapters.
// Purpose: Expose reference `CollaboratorClient` implementations and the
//          tool-execution plugin surface the core calls through.
// Dependencies: hive_core::{CollaboratorClient, CollaboratorRequest,
//              CollaboratorResponse}
// ============================================================================

//! ## Overview
//! `hive_core` defines `CollaboratorClient` as a narrow async trait and
//! never depends on a concrete LLM provider, wire format, or tool runtime —
//! those are explicitly out of scope for the execution core. This crate
//! supplies the reference adapters that make the core runnable end to end:
//! a scripted stand-in for tests and demos, an HTTP-backed client for a
//! real chat-completion endpoint, a heuristic Guard, and a logging
//! decorator any of the above can be wrapped in. Tool execution is exposed
//! through a separate, equally narrow `ToolPlugin` trait so the engine can
//! dispatch `ToolCall`s a collaborator returns without depending on any one
//! plugin implementation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod guard;
pub mod http;
pub mod logging;
pub mod scripted;
pub mod tool;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use guard::HeuristicGuard;
pub use http::HttpCollaborator;
pub use http::HttpCollaboratorConfig;
pub use http::HttpCollaboratorError;
pub use logging::LoggingCollaborator;
pub use scripted::ScriptedCollaborator;
pub use scripted::SequencedCollaborator;
pub use tool::EchoToolPlugin;
pub use tool::ToolError;
pub use tool::ToolPlugin;
pub use tool::ToolRegistry;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}
