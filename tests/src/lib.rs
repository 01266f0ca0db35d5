//! # Ledger Engine Test Suite
//!
//! Cross-crate tests that drive the engine the way a block producer does:
//! signed transactions in, one `apply_batch` per block, committed state out.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # Seeded ledger, accounts, transaction builders
//!     ├── scenarios.rs    # End-to-end flows (transfer, DVP, exchange, POA)
//!     └── properties.rs   # Invariants checked across many operations
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ledger-tests
//!
//! # By category
//! cargo test -p ledger-tests integration::scenarios::
//! cargo test -p ledger-tests integration::properties::
//!
//! # Benchmarks
//! cargo bench -p ledger-tests
//! ```

#![allow(dead_code)]

pub mod integration;
