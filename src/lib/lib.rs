pub mod config;
pub mod domain;
pub mod error;
pub mod inbound;
pub mod outbound;
