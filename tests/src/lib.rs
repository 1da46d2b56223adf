//! # Federation Coordinator Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared harness over an in-memory ledger
//! └── integration/
//!     ├── scenarios.rs  # End-to-end round scenarios
//!     ├── concurrency.rs# Racing submitters over one ledger
//!     ├── ordering.rs   # Random submission orders (proptest)
//!     ├── node.rs       # Full container: bus listeners, restarts
//!     └── ledger.rs     # Optimistic commit and range scan behaviour
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fl-tests
//! cargo test -p fl-tests integration::concurrency
//! cargo test -p fl-tests --features rocksdb   # persistent ledger restarts
//!
//! # Benchmarks
//! cargo bench -p fl-tests
//! ```

pub mod fixtures;
pub mod integration;
