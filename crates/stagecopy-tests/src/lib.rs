//! Shared fixtures for stagecopy integration tests
//!
//! Builds staged source trees and destination roots inside temporary
//! directories, and provides transfer doubles that fail on demand.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod test_utils;
