//! Test utilities and fixtures for tabprobe integration tests.
//!
//! - [`SuiteBuilder`] - Fluent API for constructing completion suites
//! - [`fake_shell_session`] - Session config for the bundled fixture shell
//! - [`temp_dir`] - Create unique temporary directories
//! - [`write_suite`] - Serialize a suite to YAML or JSON by extension
//!
//! The `tabprobe-fake-shell` binary in this crate is a small line editor with
//! readline-style completion, so suites can be exercised end to end over a
//! real PTY without a database shell installed.
//!
//! # Example
//!
//! ```ignore
//! use tabprobe::Expectation;
//! use tabprobe_fixtures::{fake_shell_session, temp_dir, write_suite, SuiteBuilder};
//!
//! let suite = SuiteBuilder::new("keywords", fake_shell_session(FAKE_SHELL, "ks"))
//!     .test("alter")
//!     .probe("alt", Expectation::immediate("\u{8}\u{8}\u{8}ALTER "))
//!     .build();
//! write_suite(&temp_dir("keywords").join("suite.yaml"), &suite);
//! ```

// Test fixtures crate - relaxed lints for test utilities
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod builders;
pub mod helpers;

pub use builders::SuiteBuilder;
pub use helpers::{fake_shell_session, temp_dir, write_suite, FAKE_PROMPT};
