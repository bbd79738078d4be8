//! Crate-level scenario tests.

mod support;
