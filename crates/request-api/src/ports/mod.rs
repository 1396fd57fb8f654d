//! Ports (Hexagonal Architecture)
//!
//! The request API only drives outbound collaborators; its inbound surface
//! is `RequestApi` itself.

pub mod outbound;

pub use outbound::*;
