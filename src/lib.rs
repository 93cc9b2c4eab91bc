pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod server;
pub mod session;
pub mod store;
