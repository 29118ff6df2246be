//! Test helpers module
//!
//! This module provides utilities and helpers for testing the feed engine.
//! It includes an in-memory event backend, a mock HTTP backend and test data.

#![allow(dead_code)]

pub mod backend_mock;
pub mod fake_source;
pub mod test_data;

pub use backend_mock::*;
pub use fake_source::*;
pub use test_data::*;
