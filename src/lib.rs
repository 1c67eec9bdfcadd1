pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{JsonSiteStore, LocalStorage, MemorySiteStore};
pub use config::TomlConfig;
pub use crate::core::codec::{decode, encode, Format, MethodTypes, SettingsCodec};
pub use crate::core::migrate::{ImportMode, MigrationEngine};
pub use domain::model::{
    MethodType, SettingValue, Settings, SettingsBundle, ShippingMethod, ShippingZone,
};
pub use utils::error::{MigrateError, Result};
