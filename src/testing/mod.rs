//! Testing utilities for vidcap
//!
//! An in-memory provider that stands in for real capture hardware, plus
//! synthetic frame payloads shaped like a USB camera's output.

pub mod mock_provider;
pub mod synthetic_data;

pub use mock_provider::{MockDevice, MockNativeEntry, MockProvider, MockSession};
pub use synthetic_data::{looks_like_jpeg, synthetic_payload};
