//! Thin boundary between the rest of the system and the underlying message
//! bus (Kafka). Every producer and consumer in the workspace talks to the
//! bus through the [`BusProducer`] / [`BusConsumer`] traits defined here so
//! the transport can be swapped or mocked without touching domain code.

pub mod consumer;
pub mod error;
pub mod producer;
pub mod subjects;

pub use consumer::{BusConsumer, KafkaBusConsumer, MessageHandler};
pub use error::{BusError, BusResult};
pub use producer::{BusProducer, Header, KafkaBusProducer};
pub use subjects::topic_for;
