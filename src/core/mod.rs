pub mod codec;
pub mod migrate;

pub use crate::domain::model::{
    BundleSummary, MethodType, SettingValue, Settings, SettingsBundle, ShippingMethod, ShippingZone,
};
pub use crate::domain::ports::{SiteStore, Storage};
pub use crate::utils::error::Result;
