//! Configuration loaded from `.notevault.toml`.

pub mod settings;

pub use settings::Settings;
