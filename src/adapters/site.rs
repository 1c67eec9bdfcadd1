use crate::domain::model::SettingsBundle;
use crate::domain::ports::SiteStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 以 JSON 文件保存站台運送設定
///
/// 檔案不存在時視為沒有任何運送設定。寫入時先寫到同目錄的暫存檔再改名，
/// 讀取端不會看到寫到一半的內容。
#[derive(Debug, Clone)]
pub struct JsonSiteStore {
    path: PathBuf,
}

impl JsonSiteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "site.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SiteStore for JsonSiteStore {
    async fn snapshot(&self) -> Result<SettingsBundle> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Site document {} does not exist, treating it as empty",
                    self.path.display()
                );
                return Ok(SettingsBundle::default());
            }
            Err(e) => return Err(e.into()),
        };

        let bundle: SettingsBundle = serde_json::from_slice(&data)?;
        tracing::debug!("Loaded {} from {}", bundle.summary(), self.path.display());
        Ok(bundle)
    }

    async fn apply(&self, bundle: SettingsBundle) -> Result<()> {
        let json = serde_json::to_vec_pretty(&bundle)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        let staged = match tokio::fs::write(&staging, &json).await {
            Ok(()) => tokio::fs::rename(&staging, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!("Applied {} to {}", bundle.summary(), self.path.display());
        Ok(())
    }
}

/// 記憶體中的站台設定
#[derive(Debug, Default)]
pub struct MemorySiteStore {
    bundle: Mutex<SettingsBundle>,
}

impl MemorySiteStore {
    pub fn new(bundle: SettingsBundle) -> Self {
        Self {
            bundle: Mutex::new(bundle),
        }
    }

    pub fn current(&self) -> SettingsBundle {
        self.bundle
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl SiteStore for MemorySiteStore {
    async fn snapshot(&self) -> Result<SettingsBundle> {
        Ok(self.current())
    }

    async fn apply(&self, bundle: SettingsBundle) -> Result<()> {
        let mut guard = self
            .bundle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = bundle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MethodType, Settings, ShippingMethod, ShippingZone};
    use tempfile::TempDir;

    fn sample() -> SettingsBundle {
        SettingsBundle::new(vec![ShippingZone::new("3", "Benelux")
            .with_regions(["NL", "BE", "LU"])
            .with_method(
                ShippingMethod::new(MethodType::FreeShipping, true)
                    .with_settings(Settings::new().with("requires", "min_amount").with("min_amount", "75")),
            )])
    }

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonSiteStore::new(temp_dir.path().join("site.json"));

        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_then_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonSiteStore::new(temp_dir.path().join("shop/site.json"));

        store.apply(sample()).await.unwrap();

        assert_eq!(store.snapshot().await.unwrap(), sample());
        assert!(!store.staging_path().exists());
    }

    #[tokio::test]
    async fn test_document_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("site.json");
        std::fs::write(
            &path,
            r#"{"zones":[{"id":"1","name":"US","regions":["US"],"methods":[
                {"type":"flat_rate","enabled":true,"settings":{"cost":"5.00","title":"Flat"}}]}]}"#,
        )
        .unwrap();

        let bundle = JsonSiteStore::new(&path).snapshot().await.unwrap();
        let method = &bundle.zones[0].methods[0];
        assert_eq!(method.method_type, MethodType::FlatRate);
        assert_eq!(method.settings.keys().collect::<Vec<_>>(), vec!["cost", "title"]);
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_no_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("site.json");
        std::fs::create_dir(&target).unwrap();
        let store = JsonSiteStore::new(&target);

        assert!(store.apply(sample()).await.is_err());
        assert!(!store.staging_path().exists());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySiteStore::default();
        store.apply(sample()).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap(), sample());
    }
}
