use crate::config::toml_config::TomlConfig;
use crate::core::codec::Format;
use crate::core::migrate::{default_export_file_name, ImportMode};
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "shipping-migrate")]
#[command(version, about = "Export and import WooCommerce shipping settings between sites")]
pub struct CliConfig {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write the site's shipping settings to a CSV/TSV file
    Export(ExportArgs),
    /// Apply a CSV/TSV export to the site
    Import(ImportArgs),
    /// Decode an export file and print its contents
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Site shipping settings document (JSON)
    #[arg(long)]
    pub site: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    /// Defaults to shipping-settings-<timestamp>.<ext>
    #[arg(long)]
    pub file_name: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    #[arg(long)]
    pub site: Option<String>,

    /// Export file to import
    #[arg(long)]
    pub input: String,

    #[arg(long, value_enum)]
    pub mode: Option<ImportMode>,

    /// Decode and plan the import without writing to the site
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    #[arg(long)]
    pub input: String,

    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub site_path: String,
    pub output_dir: String,
    pub file_name: String,
    pub format: Format,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    pub site_path: String,
    pub input: String,
    pub mode: ImportMode,
    pub dry_run: bool,
    pub format: Format,
}

impl CliConfig {
    /// 載入 `--config` 指定的設定檔，未指定時使用空設定
    pub fn load_file_config(&self) -> Result<TomlConfig> {
        let config = match &self.config {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                TomlConfig::from_file(path)?
            }
            None => TomlConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn resolve_site(flag: &Option<String>, file: &TomlConfig) -> Result<String> {
    let site = flag.clone().or_else(|| file.site_path().map(String::from));
    let site = validation::validate_required_field("site.path", &site)?;
    validation::validate_path("site.path", site)?;
    Ok(site.clone())
}

/// 格式優先順序：命令列 > 副檔名 > 設定檔 > CSV
fn resolve_format(flag: Option<Format>, path: &str, file: &TomlConfig) -> Format {
    flag.or_else(|| Format::from_path(Path::new(path)))
        .or_else(|| file.export_format())
        .unwrap_or_default()
}

impl ExportArgs {
    pub fn plan(&self, file: &TomlConfig) -> Result<ExportPlan> {
        let site_path = resolve_site(&self.site, file)?;
        let output_dir = self
            .output_dir
            .clone()
            .or_else(|| file.output_path().map(String::from))
            .unwrap_or_else(|| ".".to_string());
        validation::validate_path("export.output_path", &output_dir)?;

        let format = resolve_format(self.format, self.file_name.as_deref().unwrap_or(""), file);
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| default_export_file_name(format));

        if Path::new(&file_name).file_name().is_none() {
            return Err(MigrateError::InvalidConfigValueError {
                field: "file_name".to_string(),
                value: file_name,
                reason: "Must name a file".to_string(),
            });
        }

        Ok(ExportPlan {
            site_path,
            output_dir,
            file_name,
            format,
        })
    }
}

impl ImportArgs {
    pub fn plan(&self, file: &TomlConfig) -> Result<ImportPlan> {
        let site_path = resolve_site(&self.site, file)?;
        validation::validate_path("input", &self.input)?;

        Ok(ImportPlan {
            site_path,
            input: self.input.clone(),
            mode: self.mode.unwrap_or_else(|| file.import_mode()),
            dry_run: self.dry_run,
            format: resolve_format(self.format, &self.input, file),
        })
    }
}

impl InspectArgs {
    pub fn format(&self, file: &TomlConfig) -> Format {
        resolve_format(self.format, &self.input, file)
    }
}
