//! Test support
//!
//! Mock implementations of the external collaborators, shared between unit
//! tests and the integration suite.

pub mod mocks;
