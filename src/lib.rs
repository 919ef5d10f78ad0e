pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod grid;
pub mod movement;
pub mod registry;
pub mod room;
pub mod server_protocol;
pub mod server_utils;
pub mod service;
pub mod timers;
pub mod types;
