#![warn(clippy::unwrap_used)]

pub mod broadcast;
pub mod events;
pub mod hub;

pub use events::WsEvent;
pub use hub::Hub;
