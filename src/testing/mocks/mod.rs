//! Mock implementations for testing

pub mod runtime;

pub use runtime::{MockContainerRuntime, MockContainerRuntimeBuilder, StreamEnding};
