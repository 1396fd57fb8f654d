//! Cross-crate flows: `RequestApi` over the in-memory topic bus, answered by
//! a [`processor::CommandProcessor`].


mod expiry;
mod flows;
