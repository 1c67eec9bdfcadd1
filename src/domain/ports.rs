use crate::domain::model::SettingsBundle;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// 站台運送設定的讀取與套用
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// 讀取目前的完整運送設定
    async fn snapshot(&self) -> Result<SettingsBundle>;

    /// 以單次操作寫入整份設定，失敗時不得留下部分結果
    async fn apply(&self, bundle: SettingsBundle) -> Result<()>;
}
