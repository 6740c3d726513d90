//! Error types for the enumerator core.
//!
//! Follows the `thiserror`-derived `Error` / `Result<T>` pattern used across
//! this codebase's translation and compilation layers: one flat enum, one
//! `Result<T>` alias, no `anyhow` inside the library.

/// Errors the enumerator core can report.
///
/// Per spec: only two kinds are fatal. Everything else — unsatisfiable
/// constraints, cyclic reads-from, coherence violations, filter rejection,
/// loop-limit exceeded — is a silent candidate rejection, not an `Err`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LitmusError {
    /// A jump (or conditional jump) referenced a label that does not exist
    /// in the parsed program. This is a user error in the test input.
    #[error("jump to undefined label `{0}`")]
    UndefinedLabel(String),

    /// An internal invariant was violated: a missing location on a memory
    /// event, an absent RFMap entry for a declared final location, or a
    /// solver reporting unsatisfiability at the register-RF stage (which is
    /// constructively consistent by construction). These indicate bugs in
    /// this core or one of its collaborators, never a malformed test.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result alias used throughout the enumerator core.
pub type Result<T> = std::result::Result<T, LitmusError>;
