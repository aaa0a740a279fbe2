//! Configuration layer of the Hudson/Jenkins tray tracker
//!
//! The tray application keeps its servers, watched projects, sounds and
//! general preferences in a flat `hudson.properties` file.  The
//! [`ConfigurationStore`](settings::ConfigurationStore) loads that file
//! into typed values, rewrites it after every change and tells observers
//! about it.

pub mod error;
pub mod events;
pub mod log;
pub mod settings;

pub use error::SettingsError;
pub use settings::ConfigurationStore;
