//! Event envelope definitions and the `MessageBus` abstraction used for
//! at-least-once inter-service event delivery.

pub mod bus;
pub mod events;
pub mod nats;

pub use bus::MessageBus;
pub use events::*;
pub use nats::NatsBus;
