pub mod config;
pub mod error;
pub mod hosted;
pub mod identity;
pub mod reset;
pub mod server;
