//! Adapters (Hexagonal Architecture - Outer Layer)
//!
//! Implementations of the outbound ports for the in-memory topic bus, plus
//! the codecs the bus adapters use by default.

pub mod bus_adapter;
pub mod serdes;

pub use bus_adapter::{
    connect, connect_with_time_source, BusPublisher, BusResponseSubscriber, BusSerdes,
    BusTopicProvisioner, ConsumerHandle,
};
pub use serdes::{JsonSerde, RequestIdSerde, Utf8Serde};
