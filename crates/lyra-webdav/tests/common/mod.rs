//! Shared test infrastructure for lyra-webdav integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod harness;

pub use assertions::*;
pub use harness::*;
