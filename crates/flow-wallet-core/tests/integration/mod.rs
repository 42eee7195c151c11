//! Integration tests module
//!
//! This module contains end-to-end integration tests:
//! - Transaction signing with every key kind
//! - Account discovery

pub mod signing_flow_test;
