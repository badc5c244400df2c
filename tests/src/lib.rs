//! # Admission Gateway Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # In-memory collaborators and HTTP helpers
//! └── integration/      # Requests driven through the full router
//!     ├── two_phase.rs  # prepare → submit, expiry, at-most-once
//!     ├── routes.rs     # route table, contracts, guard, CORS, data
//!     └── service.rs    # bind, serve, graceful shutdown
//!
//! tests/benches/
//! └── buffer_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p admission-tests
//! cargo test -p admission-tests integration::two_phase
//! cargo bench -p admission-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
