use crate::core::codec::{Format, SettingsCodec};
use crate::domain::model::{BundleSummary, MergeSummary, SettingsBundle};
use crate::domain::ports::{SiteStore, Storage};
use crate::utils::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 匯入時如何處理目標站台既有的 zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ImportMode {
    /// 以匯入檔整份取代
    #[default]
    Replace,
    /// 相同 id 的 zone 取代，其餘保留
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            other => Err(MigrateError::InvalidConfigValueError {
                field: "import.mode".to_string(),
                value: other.to_string(),
                reason: "Valid modes: replace, merge".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub output_path: String,
    pub summary: BundleSummary,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub imported: BundleSummary,
    /// 套用後站台的內容
    pub resulting: BundleSummary,
    pub merge: Option<MergeSummary>,
    pub applied: bool,
}

pub struct MigrationEngine<S: Storage, T: SiteStore> {
    storage: S,
    site: T,
    codec: SettingsCodec,
}

impl<S: Storage, T: SiteStore> MigrationEngine<S, T> {
    pub fn new(storage: S, site: T, codec: SettingsCodec) -> Self {
        Self {
            storage,
            site,
            codec,
        }
    }

    pub fn codec(&self) -> &SettingsCodec {
        &self.codec
    }

    pub fn site(&self) -> &T {
        &self.site
    }

    /// 讀取站台設定並寫出匯出檔
    pub async fn export(&self, file_name: &str) -> Result<ExportReport> {
        tracing::info!("Reading shipping settings from site...");
        let bundle = self.site.snapshot().await?;
        let summary = bundle.summary();
        tracing::info!("Read {}", summary);

        let data = self.codec.encode(&bundle)?;
        let output_path = self.storage.write_file(file_name, &data).await?;
        tracing::info!("Exported {} bytes to {}", data.len(), output_path);

        Ok(ExportReport {
            output_path,
            summary,
            bytes: data.len(),
        })
    }

    /// 解碼匯入檔並套用到站台；套用前的任何錯誤都不會改動站台
    pub async fn import(&self, file_name: &str, mode: ImportMode, dry_run: bool) -> Result<ImportReport> {
        let incoming = self.inspect(file_name).await?;
        let imported = incoming.summary();

        let (resulting, merge) = match mode {
            ImportMode::Replace => (incoming, None),
            ImportMode::Merge => {
                let current = self.site.snapshot().await?;
                let (merged, summary) = current.merge(incoming);
                tracing::info!(
                    "Merge plan: {} zones added, {} replaced, {} kept",
                    summary.added,
                    summary.replaced,
                    summary.kept
                );
                (merged, Some(summary))
            }
        };
        resulting.validate()?;
        let resulting_summary = resulting.summary();

        if dry_run {
            tracing::info!("Dry run: site left unchanged, would contain {}", resulting_summary);
        } else {
            self.site.apply(resulting).await?;
            tracing::info!("Applied {} to site ({} mode)", resulting_summary, mode);
        }

        Ok(ImportReport {
            mode,
            imported,
            resulting: resulting_summary,
            merge,
            applied: !dry_run,
        })
    }

    /// 只解碼與驗證匯入檔，不碰站台
    pub async fn inspect(&self, file_name: &str) -> Result<SettingsBundle> {
        tracing::info!("Reading import file {}", file_name);
        let data = self.storage.read_file(file_name).await?;

        let bundle = self.codec.decode(&data)?;
        bundle.validate()?;
        tracing::info!("Decoded {}", bundle.summary());
        Ok(bundle)
    }
}

/// 預設匯出檔名，例如 `shipping-settings-20240131-094500.csv`
pub fn default_export_file_name(format: Format) -> String {
    format!(
        "shipping-settings-{}.{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySiteStore;
    use crate::domain::model::{MethodType, Settings, ShippingMethod, ShippingZone};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MockStorage {
        fn with_file(self, name: &str, data: &[u8]) -> Self {
            self.files.lock().unwrap().insert(name.to_string(), data.to_vec());
            self
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound).into())
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<String> {
            self.files.lock().unwrap().insert(path.to_string(), data.to_vec());
            Ok(format!("mock://{}", path))
        }
    }

    fn site_bundle() -> SettingsBundle {
        SettingsBundle::new(vec![
            ShippingZone::new("1", "Domestic").with_regions(["US"]).with_method(
                ShippingMethod::new(MethodType::FlatRate, true)
                    .with_settings(Settings::new().with("cost", "5.00")),
            ),
            ShippingZone::new("2", "Canada").with_regions(["CA"]),
        ])
    }

    #[tokio::test]
    async fn test_export_writes_encoded_bundle() {
        let engine = MigrationEngine::new(
            MockStorage::default(),
            MemorySiteStore::new(site_bundle()),
            SettingsCodec::default(),
        );

        let report = engine.export("out.csv").await.unwrap();
        assert_eq!(report.output_path, "mock://out.csv");
        assert_eq!(report.summary.zones, 2);

        let written = engine.storage.read_file("out.csv").await.unwrap();
        assert_eq!(report.bytes, written.len());
        assert_eq!(engine.codec().decode(&written).unwrap(), site_bundle());
    }

    #[tokio::test]
    async fn test_import_replace() {
        let data = crate::core::codec::encode(&site_bundle()).unwrap();
        let engine = MigrationEngine::new(
            MockStorage::default().with_file("in.csv", &data),
            MemorySiteStore::new(SettingsBundle::new(vec![ShippingZone::new("9", "Old")])),
            SettingsCodec::default(),
        );

        let report = engine.import("in.csv", ImportMode::Replace, false).await.unwrap();
        assert!(report.applied);
        assert_eq!(report.merge, None);
        assert_eq!(engine.site().current(), site_bundle());
    }

    #[tokio::test]
    async fn test_import_merge_keeps_unrelated_zones() {
        let incoming = SettingsBundle::new(vec![ShippingZone::new("2", "Canada and territories")]);
        let data = crate::core::codec::encode(&incoming).unwrap();
        let engine = MigrationEngine::new(
            MockStorage::default().with_file("in.csv", &data),
            MemorySiteStore::new(site_bundle()),
            SettingsCodec::default(),
        );

        let report = engine.import("in.csv", ImportMode::Merge, false).await.unwrap();
        let merge = report.merge.unwrap();
        assert_eq!((merge.added, merge.replaced, merge.kept), (0, 1, 1));

        let site = engine.site().current();
        assert_eq!(site.zones.len(), 2);
        assert_eq!(site.zone("2").unwrap().name, "Canada and territories");
        assert!(site.zone("2").unwrap().regions.is_empty());
        assert_eq!(site.zone("1"), site_bundle().zone("1"));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_site_untouched() {
        let data = crate::core::codec::encode(&SettingsBundle::default()).unwrap();
        let engine = MigrationEngine::new(
            MockStorage::default().with_file("in.csv", &data),
            MemorySiteStore::new(site_bundle()),
            SettingsCodec::default(),
        );

        let report = engine.import("in.csv", ImportMode::Replace, true).await.unwrap();
        assert!(!report.applied);
        assert_eq!(report.resulting.zones, 0);
        assert_eq!(engine.site().current(), site_bundle());
    }

    #[tokio::test]
    async fn test_malformed_file_is_not_applied() {
        let engine = MigrationEngine::new(
            MockStorage::default().with_file("in.csv", b"zone_id,zone_name\nz1,US\n"),
            MemorySiteStore::new(site_bundle()),
            SettingsCodec::default(),
        );

        let err = engine.import("in.csv", ImportMode::Replace, false).await.unwrap_err();
        assert!(matches!(err, MigrateError::ParseError { line: 1, .. }));
        assert_eq!(engine.site().current(), site_bundle());
    }

    #[test]
    fn test_import_mode_parsing() {
        assert_eq!("MERGE".parse::<ImportMode>().unwrap(), ImportMode::Merge);
        assert!("append".parse::<ImportMode>().is_err());
    }

    #[test]
    fn test_default_export_file_name() {
        let name = default_export_file_name(Format::Tsv);
        assert!(name.starts_with("shipping-settings-"));
        assert!(name.ends_with(".tsv"));
    }
}
