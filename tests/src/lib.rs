//! # Request API Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── registry_benchmarks.rs  # ExpiringMap and dispatcher throughput
//! │
//! └── src/integration/
//!     ├── processor.rs            # Stand-in downstream command processor
//!     ├── flows.rs                # Publish / query / respond round trips
//!     └── expiry.rs               # Retention window and sweeping
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p request-api-tests
//!
//! # By category
//! cargo test -p request-api-tests integration::flows
//! cargo test -p request-api-tests integration::expiry
//!
//! # Benchmarks
//! cargo bench -p request-api-tests
//! ```

pub mod integration;
