//! Testing utilities
//!
//! Mock implementations of the external seams so log streaming can be tested
//! without a container runtime.

pub mod mocks;
