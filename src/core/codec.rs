//! 運送設定的 CSV/TSV 編碼與解碼
//!
//! 每個運送方式設定一列，zone 與 method 欄位在同一 zone/method 的每一列重複出現。
//! 沒有 method 的 zone、沒有設定的 method 各以一列表示，相關欄位留空。

use crate::domain::model::{
    MethodType, SettingValue, SettingsBundle, ShippingMethod, ShippingZone,
};
use crate::utils::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const COLUMNS: [&str; 9] = [
    "zone_id",
    "zone_name",
    "zone_regions",
    "method_position",
    "method_type",
    "method_enabled",
    "setting_key",
    "setting_type",
    "setting_value",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Format {
    #[default]
    Csv,
    Tsv,
}

impl Format {
    pub const fn delimiter(&self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }

    /// 由副檔名判斷格式，無法判斷時回傳 `None`
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            other => Err(MigrateError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "Unsupported format. Valid formats: csv, tsv".to_string(),
            }),
        }
    }
}

/// 可接受的運送方式類型：內建類型加上額外註冊的外掛類型
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodTypes {
    extra: HashSet<String>,
}

impl MethodTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn contains(&self, method_type: &MethodType) -> bool {
        match method_type {
            // 內建名稱包成 Other 時解碼會變回內建變體
            MethodType::Other(tag) => {
                self.extra.contains(tag) && !MethodType::from_tag(tag).is_built_in()
            }
            _ => true,
        }
    }

    pub fn resolve(&self, tag: &str) -> Option<MethodType> {
        let method_type = MethodType::from_tag(tag);
        self.contains(&method_type).then_some(method_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsCodec {
    format: Format,
    method_types: MethodTypes,
}

impl SettingsCodec {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            method_types: MethodTypes::default(),
        }
    }

    pub fn with_method_types(mut self, method_types: MethodTypes) -> Self {
        self.method_types = method_types;
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn method_types(&self) -> &MethodTypes {
        &self.method_types
    }

    /// 編碼整份設定；輸出只取決於 bundle 內容
    pub fn encode(&self, bundle: &SettingsBundle) -> Result<Vec<u8>> {
        bundle.validate().map_err(|e| match e {
            MigrateError::ValidationError { message } => MigrateError::encoding(message),
            other => other,
        })?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.format.delimiter())
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());

        write_row(&mut writer, COLUMNS)?;

        for zone in &bundle.zones {
            let regions = serde_json::to_string(&zone.regions).map_err(|e| {
                MigrateError::encoding(format!("regions of zone '{}': {}", zone.id, e))
            })?;

            if zone.methods.is_empty() {
                write_row(
                    &mut writer,
                    [&zone.id, &zone.name, regions.as_str(), "", "", "", "", "", ""],
                )?;
                continue;
            }

            for (position, method) in zone.methods.iter().enumerate() {
                if !self.method_types.contains(&method.method_type) {
                    return Err(MigrateError::encoding(format!(
                        "method type '{}' in zone '{}' is not registered",
                        method.method_type, zone.id
                    )));
                }

                let position = position.to_string();
                let enabled = if method.enabled { "yes" } else { "no" };
                let method_type = method.method_type.as_str();

                if method.settings.is_empty() {
                    write_row(
                        &mut writer,
                        [
                            &zone.id,
                            &zone.name,
                            regions.as_str(),
                            &position,
                            method_type,
                            enabled,
                            "",
                            "",
                            "",
                        ],
                    )?;
                    continue;
                }

                for (key, value) in method.settings.iter() {
                    let text = value.to_string();
                    write_row(
                        &mut writer,
                        [
                            &zone.id,
                            &zone.name,
                            regions.as_str(),
                            &position,
                            method_type,
                            enabled,
                            key,
                            value.type_name(),
                            &text,
                        ],
                    )?;
                }
            }
        }

        writer
            .into_inner()
            .map_err(|e| MigrateError::encoding(format!("failed to flush output: {}", e.error())))
    }

    /// 解碼匯入檔案；任何錯誤都會附上行號
    pub fn decode(&self, bytes: &[u8]) -> Result<SettingsBundle> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SettingsBundle::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.format.delimiter())
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut builder = BundleBuilder::default();
        let mut header_checked = false;

        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                MigrateError::parse(line, e.to_string())
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.len() != COLUMNS.len() {
                return Err(MigrateError::parse(
                    line,
                    format!(
                        "expected {} columns, found {}",
                        COLUMNS.len(),
                        record.len()
                    ),
                ));
            }

            if !header_checked {
                check_header(&record, line)?;
                header_checked = true;
                continue;
            }

            let row = self.parse_row(&record, line)?;
            builder.push(row, line)?;
        }

        let bundle = builder.finish();
        tracing::debug!("Decoded {}", bundle.summary());
        Ok(bundle)
    }

    fn parse_row(&self, record: &csv::StringRecord, line: u64) -> Result<Row> {
        let field = |i: usize| record.get(i).unwrap_or("");

        let zone_id = field(0);
        if zone_id.is_empty() {
            return Err(MigrateError::parse(line, "zone_id is empty"));
        }

        let regions = parse_regions(field(2), line)?;

        let method_cells = [field(3), field(4), field(5)];
        let setting_cells = [field(6), field(7), field(8)];

        let method = if method_cells.iter().all(|c| c.is_empty()) {
            if setting_cells.iter().any(|c| !c.is_empty()) {
                return Err(MigrateError::parse(
                    line,
                    "setting columns are filled but the method columns are empty",
                ));
            }
            None
        } else {
            Some(self.parse_method(method_cells, setting_cells, line)?)
        };

        Ok(Row {
            zone_id: zone_id.to_string(),
            zone_name: field(1).to_string(),
            regions,
            method,
        })
    }

    fn parse_method(
        &self,
        [position, method_type, enabled]: [&str; 3],
        [key, setting_type, value]: [&str; 3],
        line: u64,
    ) -> Result<MethodRow> {
        let position = position.parse::<usize>().map_err(|_| {
            MigrateError::parse(line, format!("invalid method_position '{}'", position))
        })?;

        if method_type.is_empty() {
            return Err(MigrateError::parse(line, "method_type is empty"));
        }
        let method_type = self.method_types.resolve(method_type).ok_or_else(|| {
            MigrateError::parse(line, format!("unknown method type '{}'", method_type))
        })?;

        let enabled = parse_enabled(enabled)
            .ok_or_else(|| MigrateError::parse(line, format!("invalid method_enabled '{}'", enabled)))?;

        let setting = if key.is_empty() {
            if !setting_type.is_empty() || !value.is_empty() {
                return Err(MigrateError::parse(line, "setting value without a setting key"));
            }
            None
        } else {
            Some((key.to_string(), parse_value(setting_type, value, line)?))
        };

        Ok(MethodRow {
            position,
            method_type,
            enabled,
            setting,
        })
    }
}

/// 以預設 CSV 格式與內建運送方式編碼
pub fn encode(bundle: &SettingsBundle) -> Result<Vec<u8>> {
    SettingsCodec::default().encode(bundle)
}

/// 以預設 CSV 格式與內建運送方式解碼
pub fn decode(bytes: &[u8]) -> Result<SettingsBundle> {
    SettingsCodec::default().decode(bytes)
}

fn write_row<W: std::io::Write>(writer: &mut csv::Writer<W>, row: [&str; 9]) -> Result<()> {
    writer
        .write_record(row)
        .map_err(|e| MigrateError::encoding(format!("failed to write row: {}", e)))
}

fn check_header(record: &csv::StringRecord, line: u64) -> Result<()> {
    let matches = record
        .iter()
        .zip(COLUMNS)
        .all(|(found, expected)| found.trim().eq_ignore_ascii_case(expected));

    if matches {
        Ok(())
    } else {
        Err(MigrateError::parse(
            line,
            format!("unexpected header, expected '{}'", COLUMNS.join(",")),
        ))
    }
}

fn parse_regions(cell: &str, line: u64) -> Result<Vec<String>> {
    if cell.is_empty() {
        return Ok(Vec::new());
    }
    let regions: Vec<String> = serde_json::from_str(cell).map_err(|e| {
        MigrateError::parse(line, format!("zone_regions is not a JSON string array: {}", e))
    })?;
    if regions.iter().any(String::is_empty) {
        return Err(MigrateError::parse(line, "zone_regions contains an empty region code"));
    }
    Ok(regions)
}

fn parse_enabled(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_value(setting_type: &str, value: &str, line: u64) -> Result<SettingValue> {
    match setting_type {
        "string" => Ok(SettingValue::Text(value.to_string())),
        "number" => serde_json::Number::from_str(value)
            .map(SettingValue::Number)
            .map_err(|_| MigrateError::parse(line, format!("invalid number '{}'", value))),
        "bool" => match value {
            "true" => Ok(SettingValue::Bool(true)),
            "false" => Ok(SettingValue::Bool(false)),
            _ => Err(MigrateError::parse(line, format!("invalid bool '{}'", value))),
        },
        other => Err(MigrateError::parse(
            line,
            format!("unknown setting type '{}'", other),
        )),
    }
}

struct Row {
    zone_id: String,
    zone_name: String,
    regions: Vec<String>,
    method: Option<MethodRow>,
}

struct MethodRow {
    position: usize,
    method_type: MethodType,
    enabled: bool,
    setting: Option<(String, SettingValue)>,
}

/// 依序組回 bundle，並檢查同一 zone/method 的各列是否一致
#[derive(Default)]
struct BundleBuilder {
    zones: Vec<ShippingZone>,
    seen: HashSet<String>,
    zone_without_methods: bool,
    method_without_settings: bool,
}

impl BundleBuilder {
    fn push(&mut self, row: Row, line: u64) -> Result<()> {
        let continues = self.zones.last().is_some_and(|zone| zone.id == row.zone_id);

        if !continues {
            if !self.seen.insert(row.zone_id.clone()) {
                return Err(MigrateError::parse(
                    line,
                    format!("zone '{}' appears again after other zones", row.zone_id),
                ));
            }
            self.zones.push(ShippingZone {
                id: row.zone_id,
                name: row.zone_name,
                regions: row.regions,
                methods: Vec::new(),
            });
            self.zone_without_methods = row.method.is_none();
            return match row.method {
                Some(method) => self.push_method(method, line),
                None => Ok(()),
            };
        }

        let Some(zone) = self.zones.last() else {
            return Err(MigrateError::parse(line, "row continues a zone that was never started"));
        };
        if zone.name != row.zone_name {
            return Err(MigrateError::parse(
                line,
                format!("zone '{}' has conflicting names", zone.id),
            ));
        }
        if zone.regions != row.regions {
            return Err(MigrateError::parse(
                line,
                format!("zone '{}' has conflicting regions", zone.id),
            ));
        }

        match row.method {
            Some(method) if !self.zone_without_methods => self.push_method(method, line),
            _ => Err(MigrateError::parse(
                line,
                format!(
                    "zone '{}' mixes a row without methods with method rows",
                    zone.id
                ),
            )),
        }
    }

    fn push_method(&mut self, row: MethodRow, line: u64) -> Result<()> {
        let Some(zone) = self.zones.last_mut() else {
            return Err(MigrateError::parse(line, "method row without a zone"));
        };
        let next = zone.methods.len();

        if row.position == next {
            let mut method = ShippingMethod::new(row.method_type, row.enabled);
            self.method_without_settings = row.setting.is_none();
            if let Some((key, value)) = row.setting {
                method.settings.insert(key, value);
            }
            zone.methods.push(method);
            return Ok(());
        }

        let continues = next > 0 && row.position == next - 1;
        let Some(method) = zone.methods.last_mut().filter(|_| continues) else {
            return Err(MigrateError::parse(
                line,
                format!(
                    "method_position {} out of sequence in zone '{}', expected {}",
                    row.position, zone.id, next
                ),
            ));
        };

        if method.method_type != row.method_type || method.enabled != row.enabled {
            return Err(MigrateError::parse(
                line,
                format!(
                    "method {} of zone '{}' has conflicting type or enabled flag",
                    row.position, zone.id
                ),
            ));
        }

        let Some((key, value)) = row.setting.filter(|_| !self.method_without_settings) else {
            return Err(MigrateError::parse(
                line,
                format!(
                    "method {} of zone '{}' mixes a row without settings with setting rows",
                    row.position, zone.id
                ),
            ));
        };

        if method.settings.contains_key(&key) {
            return Err(MigrateError::parse(
                line,
                format!("duplicate setting key '{}'", key),
            ));
        }
        method.settings.insert(key, value);
        Ok(())
    }

    fn finish(self) -> SettingsBundle {
        SettingsBundle::new(self.zones)
    }
}
