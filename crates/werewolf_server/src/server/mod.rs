#![forbid(unsafe_code)]

pub mod chat;
pub mod connection;
pub mod gateway;
pub mod health;
pub mod room_hub;
pub mod store;
pub mod timer;
