pub mod config;
pub mod coordinator;
pub mod errors;
pub mod gateway;
pub mod notes;
