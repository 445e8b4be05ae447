//! Command-line surface for Signoff.
//!
//! The CLI is per-invocation: `sign` persists the rendered PNG into the
//! signatures directory, and `merge` restores every stored signature before
//! running the pipeline, so a signing session can be spread over many
//! invocations.

pub mod cli;
