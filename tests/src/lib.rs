//! # Lifecycle Manager Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Protocol scenarios across core and daemon
//!     ├── harness.rs    # Guests on in-memory serial channels
//!     └── scenarios.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lm-tests
//! cargo test -p lm-tests integration::scenarios
//! ```

pub mod integration;
