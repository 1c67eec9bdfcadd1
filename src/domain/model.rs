use crate::utils::error::{MigrateError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// 運送方式類型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodType {
    FlatRate,
    FreeShipping,
    LocalPickup,
    /// 外掛提供的方式，例如 `table_rate`
    Other(String),
}

impl MethodType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FlatRate => "flat_rate",
            Self::FreeShipping => "free_shipping",
            Self::LocalPickup => "local_pickup",
            Self::Other(tag) => tag,
        }
    }

    /// 內建類型回傳對應變體，其餘一律視為 `Other`
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "flat_rate" => Self::FlatRate,
            "free_shipping" => Self::FreeShipping,
            "local_pickup" => Self::LocalPickup,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_built_in(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MethodType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MethodType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// 單一設定值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Number(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// 依插入順序保存的設定鍵值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    entries: Vec<(String, SettingValue)>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存在的鍵會原地覆寫，保留原本位置
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<SettingValue>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Settings::new();
        for (key, value) in iter {
            settings.insert(key, value);
        }
        settings
    }
}

impl Serialize for Settings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SettingsVisitor;

        impl<'de> Visitor<'de> for SettingsVisitor {
            type Value = Settings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of setting keys to strings, numbers or booleans")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Settings, A::Error> {
                let mut settings = Settings::new();
                while let Some((key, value)) = access.next_entry::<String, SettingValue>()? {
                    if settings.contains_key(&key) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate setting key '{}'",
                            key
                        )));
                    }
                    settings.insert(key, value);
                }
                Ok(settings)
            }
        }

        deserializer.deserialize_map(SettingsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod {
    #[serde(rename = "type")]
    pub method_type: MethodType,
    pub enabled: bool,
    #[serde(default)]
    pub settings: Settings,
}

impl ShippingMethod {
    pub fn new(method_type: MethodType, enabled: bool) -> Self {
        Self {
            method_type,
            enabled,
            settings: Settings::new(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub methods: Vec<ShippingMethod>,
}

impl ShippingZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            regions: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_method(mut self, method: ShippingMethod) -> Self {
        self.methods.push(method);
        self
    }
}

/// 一個站台完整可匯出的運送設定快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsBundle {
    #[serde(default)]
    pub zones: Vec<ShippingZone>,
}

/// 合併結果統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub replaced: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleSummary {
    pub zones: usize,
    pub methods: usize,
    pub settings: usize,
}

impl fmt::Display for BundleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zones, {} methods, {} settings",
            self.zones, self.methods, self.settings
        )
    }
}

impl SettingsBundle {
    pub fn new(zones: Vec<ShippingZone>) -> Self {
        Self { zones }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone(&self, id: &str) -> Option<&ShippingZone> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    pub fn summary(&self) -> BundleSummary {
        let methods = self.zones.iter().flat_map(|zone| &zone.methods);
        BundleSummary {
            zones: self.zones.len(),
            methods: self.zones.iter().map(|zone| zone.methods.len()).sum(),
            settings: methods.map(|method| method.settings.len()).sum(),
        }
    }

    /// 檢查 zone id 唯一且非空、地區代碼與設定鍵非空
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for zone in &self.zones {
            if zone.id.is_empty() {
                return Err(MigrateError::ValidationError {
                    message: format!("zone '{}' has an empty id", zone.name),
                });
            }
            if !seen.insert(zone.id.as_str()) {
                return Err(MigrateError::ValidationError {
                    message: format!("duplicate zone id '{}'", zone.id),
                });
            }
            if zone.regions.iter().any(|region| region.is_empty()) {
                return Err(MigrateError::ValidationError {
                    message: format!("zone '{}' contains an empty region code", zone.id),
                });
            }
            for method in &zone.methods {
                if method.method_type.as_str().is_empty() {
                    return Err(MigrateError::ValidationError {
                        message: format!("zone '{}' has a method without a type", zone.id),
                    });
                }
                if method.settings.keys().any(str::is_empty) {
                    return Err(MigrateError::ValidationError {
                        message: format!(
                            "{} method in zone '{}' has an empty setting key",
                            method.method_type, zone.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// 以 id 比對：相同 id 的 zone 原地取代，新的 zone 依序附加，其餘保留
    pub fn merge(mut self, incoming: SettingsBundle) -> (SettingsBundle, MergeSummary) {
        let mut summary = MergeSummary::default();
        let incoming_ids: HashSet<String> =
            incoming.zones.iter().map(|zone| zone.id.clone()).collect();
        summary.kept = self
            .zones
            .iter()
            .filter(|zone| !incoming_ids.contains(&zone.id))
            .count();

        for zone in incoming.zones {
            match self.zones.iter_mut().find(|existing| existing.id == zone.id) {
                Some(existing) => {
                    *existing = zone;
                    summary.replaced += 1;
                }
                None => {
                    self.zones.push(zone);
                    summary.added += 1;
                }
            }
        }

        (self, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str) -> ShippingZone {
        ShippingZone::new(id, format!("Zone {}", id))
    }

    #[test]
    fn test_settings_keep_insertion_order() {
        let mut settings = Settings::new();
        settings.insert("title", "Flat rate");
        settings.insert("cost", "5.00");
        settings.insert("tax_status", "taxable");
        settings.insert("cost", "7.50");

        let keys: Vec<&str> = settings.keys().collect();
        assert_eq!(keys, vec!["title", "cost", "tax_status"]);
        assert_eq!(settings.get("cost"), Some(&SettingValue::from("7.50")));
    }

    #[test]
    fn test_settings_json_preserves_order_and_types() {
        let settings = Settings::new()
            .with("z_last", "a")
            .with("a_first", 3i64)
            .with("ignore_discounts", false);

        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"z_last":"a","a_first":3,"ignore_discounts":false}"#);

        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_settings_json_rejects_duplicate_keys() {
        let result: serde_json::Result<Settings> = serde_json::from_str(r#"{"cost":"1","cost":"2"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_method_type_tags() {
        assert_eq!(MethodType::from_tag("flat_rate"), MethodType::FlatRate);
        assert_eq!(
            MethodType::from_tag("table_rate"),
            MethodType::Other("table_rate".to_string())
        );
        assert_eq!(MethodType::LocalPickup.to_string(), "local_pickup");
        assert!(!MethodType::from_tag("table_rate").is_built_in());
    }

    #[test]
    fn test_validate_rejects_duplicate_zone_ids() {
        let bundle = SettingsBundle::new(vec![zone("1"), zone("2"), zone("1")]);
        let err = bundle.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate zone id '1'"));
    }

    #[test]
    fn test_validate_rejects_empty_setting_key() {
        let method = ShippingMethod::new(MethodType::FlatRate, true)
            .with_settings(Settings::new().with("", "x"));
        let bundle = SettingsBundle::new(vec![zone("1").with_method(method)]);
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn test_merge_replaces_matching_zones_and_keeps_others() {
        let current = SettingsBundle::new(vec![zone("1"), zone("2"), zone("3")]);
        let incoming = SettingsBundle::new(vec![
            ShippingZone::new("2", "Europe"),
            ShippingZone::new("9", "Asia"),
        ]);

        let (merged, summary) = current.merge(incoming);

        let ids: Vec<&str> = merged.zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "9"]);
        assert_eq!(merged.zone("2").unwrap().name, "Europe");
        assert_eq!(
            summary,
            MergeSummary {
                added: 1,
                replaced: 1,
                kept: 2
            }
        );
    }

    #[test]
    fn test_summary_counts() {
        let method = ShippingMethod::new(MethodType::FreeShipping, true)
            .with_settings(Settings::new().with("min_amount", "50").with("requires", "min_amount"));
        let bundle = SettingsBundle::new(vec![
            zone("1").with_method(method),
            zone("2").with_method(ShippingMethod::new(MethodType::LocalPickup, false)),
        ]);

        let summary = bundle.summary();
        assert_eq!(summary.to_string(), "2 zones, 2 methods, 2 settings");
    }
}
