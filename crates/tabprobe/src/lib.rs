//! tabprobe: a PTY harness for verifying interactive tab completion.
//!
//! The harness types a probe into a live shell, presses TAB (and TAB again when
//! nothing was inserted), classifies what the shell printed as an immediate
//! completion or a listed set of candidates, and matches the result against an
//! expectation. After every probe the line is cancelled and the session is
//! resynchronized to a clean prompt so probes never leak into each other.

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal helpers will be documented in future releases.
#![allow(missing_docs)]

pub mod config;
pub mod fixture;
pub mod matcher;
pub mod model;
pub mod prompt;
pub mod protocol;
pub mod recovery;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod transport;

pub use crate::model::*;
