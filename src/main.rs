use anyhow::Context;
use clap::Parser;
use shipping_migrate::config::cli::{Command, InspectArgs};
use shipping_migrate::core::migrate::MigrationEngine;
use shipping_migrate::utils::error::ErrorSeverity;
use shipping_migrate::utils::logger;
use shipping_migrate::{
    CliConfig, JsonSiteStore, LocalStorage, MemorySiteStore, MigrateError, SettingsBundle, SettingsCodec,
    TomlConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let file_config = cli
        .load_file_config()
        .context("failed to load configuration")?;

    // 初始化日誌
    if cli.json_logs || file_config.json_logs() {
        logger::init_json_logger(cli.verbose, file_config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, file_config.log_level());
    }

    tracing::info!("Starting shipping-migrate");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli, &file_config).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Medium => 2, // 匯入檔或匯出資料有問題
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(cli: &CliConfig, file_config: &TomlConfig) -> Result<(), MigrateError> {
    match &cli.command {
        Command::Export(args) => {
            let plan = args.plan(file_config)?;
            let codec = SettingsCodec::new(plan.format).with_method_types(file_config.method_types());
            let engine = MigrationEngine::new(
                LocalStorage::new(&plan.output_dir),
                JsonSiteStore::new(&plan.site_path),
                codec,
            );

            let report = engine.export(&plan.file_name).await?;
            println!("✅ Exported {}", report.summary);
            println!("📁 Output saved to: {}", report.output_path);
        }
        Command::Import(args) => {
            let plan = args.plan(file_config)?;
            let codec = SettingsCodec::new(plan.format).with_method_types(file_config.method_types());
            let engine = MigrationEngine::new(
                LocalStorage::new("."),
                JsonSiteStore::new(&plan.site_path),
                codec,
            );

            let report = engine.import(&plan.input, plan.mode, plan.dry_run).await?;
            if let Some(merge) = report.merge {
                println!(
                    "🔀 {} zones added, {} replaced, {} kept",
                    merge.added, merge.replaced, merge.kept
                );
            }
            if report.applied {
                println!("✅ Imported {} ({} mode)", report.imported, report.mode);
            } else {
                println!("🔍 Dry run: site would contain {}", report.resulting);
            }
        }
        Command::Inspect(args) => inspect(args, file_config).await?,
    }

    Ok(())
}

async fn inspect(args: &InspectArgs, file_config: &TomlConfig) -> Result<(), MigrateError> {
    let codec = SettingsCodec::new(args.format(file_config)).with_method_types(file_config.method_types());
    let engine = MigrationEngine::new(LocalStorage::new("."), MemorySiteStore::default(), codec);

    let bundle = engine.inspect(&args.input).await?;
    print_bundle(&bundle);
    Ok(())
}

fn print_bundle(bundle: &SettingsBundle) {
    println!("{}", bundle.summary());
    for zone in &bundle.zones {
        println!("Zone {} \"{}\" [{}]", zone.id, zone.name, zone.regions.join(", "));
        for (position, method) in zone.methods.iter().enumerate() {
            let state = if method.enabled { "enabled" } else { "disabled" };
            println!("  #{} {} ({})", position, method.method_type, state);
            for (key, value) in method.settings.iter() {
                println!("     {} = {:?} ({})", key, value.to_string(), value.type_name());
            }
        }
    }
}
