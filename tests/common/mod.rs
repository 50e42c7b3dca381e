//! Shared test utilities for fwdlog integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file.

pub mod assertions;
pub mod builders;
pub mod driver;
pub mod fixtures;
pub mod raw_peer;

pub use assertions::*;
pub use builders::*;
pub use driver::*;
pub use fixtures::*;
pub use raw_peer::*;
