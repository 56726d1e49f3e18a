//! Operations modules for interacting with external version control systems.
//!
//! - [`git`]: the working-copy operations the stable-branch synchronizer needs
//!   (clone, branch lookup, checkout, branch creation, non-fast-forward merge)
//!
//! Each submodule provides a trait-based abstraction with a real implementation
//! and a mock generated for tests.

pub mod git;
