use crate::core::codec::{Format, MethodTypes};
use crate::core::migrate::ImportMode;
use crate::domain::model::MethodType;
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// 設定檔內容，所有區段皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub site: Option<SiteConfig>,
    pub export: Option<ExportConfig>,
    pub import: Option<ImportConfig>,
    pub method_types: Option<MethodTypesConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// 站台運送設定 JSON 文件
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_path: Option<String>,
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    pub mode: Option<ImportMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodTypesConfig {
    #[serde(default)]
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MigrateError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MigrateError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SITE_PATH})，未設定的保留原字串
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(site) = &self.site {
            validation::validate_path("site.path", &site.path)?;
        }

        if let Some(output_path) = self.export.as_ref().and_then(|e| e.output_path.as_deref()) {
            validation::validate_path("export.output_path", output_path)?;
        }

        let extra = self.extra_method_types();
        for tag in extra {
            validation::validate_identifier("method_types.extra", tag)?;
            if MethodType::from_tag(tag).is_built_in() {
                return Err(MigrateError::InvalidConfigValueError {
                    field: "method_types.extra".to_string(),
                    value: tag.clone(),
                    reason: "Built-in method types do not need to be registered".to_string(),
                });
            }
        }
        validation::validate_unique("method_types.extra", extra)?;

        if let Some(level) = self.log_level() {
            validation::validate_one_of("logging.level", level, &LOG_LEVELS)?;
        }

        Ok(())
    }

    pub fn site_path(&self) -> Option<&str> {
        self.site.as_ref().map(|s| s.path.as_str())
    }

    pub fn output_path(&self) -> Option<&str> {
        self.export.as_ref().and_then(|e| e.output_path.as_deref())
    }

    pub fn export_format(&self) -> Option<Format> {
        self.export.as_ref().and_then(|e| e.format)
    }

    pub fn import_mode(&self) -> ImportMode {
        self.import.as_ref().and_then(|i| i.mode).unwrap_or_default()
    }

    pub fn extra_method_types(&self) -> &[String] {
        self.method_types
            .as_ref()
            .map(|m| m.extra.as_slice())
            .unwrap_or(&[])
    }

    pub fn method_types(&self) -> MethodTypes {
        MethodTypes::new().with_extra(self.extra_method_types().iter().cloned())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
