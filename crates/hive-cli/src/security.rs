// hive-cli/src/security.rs
// ============================================================================
// Module: CLI Security Helpers
// Description: Constant-time comparisons for auth-sensitive CLI inputs.
// Purpose: Avoid timing side channels when checking a supplied auth key
//          against the configured one (`auth.enabled`/`auth.api_key_env`).
// Dependencies: subtle
// ============================================================================

//! ## Overview
//! Control-surface auth (spec.md §6 `auth`) only matters once the RPC is
//! exposed on a network, which is out of this crate's scope, but the CLI
//! still accepts an `--auth-key` flag for parity with that configuration
//! and to let operators smoke-test a deployment's expected key locally.
//! Comparing that flag against the configured key byte-by-byte with `==`
//! would leak timing information proportional to the matching prefix
//! length; [`keys_match`] compares in constant time instead.

use subtle::ConstantTimeEq;

/// Returns `true` if `supplied` matches `expected`, in constant time with
/// respect to `expected`'s contents. Differing lengths compare unequal
/// without leaking which byte first differed.
#[must_use]
pub fn keys_match(supplied: &str, expected: &str) -> bool {
    if supplied.len() != expected.len() {
        return false;
    }
    supplied.as_bytes().ct_eq(expected.as_bytes()).into()
}
