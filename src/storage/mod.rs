//! Storage module for configuration.

pub mod config;

pub use config::{
    ConfigError, IndicatorSettings, LocationEntry, ProviderSelection, SettingsChange, SettingsStore,
};
