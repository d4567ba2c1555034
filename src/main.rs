use care_referrals::adapters::FileResourceSource;
use care_referrals::config::{Cli, Command};
use care_referrals::utils::error::ErrorSeverity;
use care_referrals::utils::{logger, validation::Validate};
use care_referrals::{
    AppConfig, AppState, GeocodeEngine, GeocodePipeline, GoogleGeocoder,
    LocalStorage, ReferralError, ResourceLoader,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            exit_with(e);
            return;
        }
    };

    // 初始化日誌
    let verbose = cli.verbose || config.logging.verbose;
    if config.logging.json && matches!(cli.command, Command::Serve) {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting care-referrals");
    if verbose {
        tracing::debug!("Config file: {}", cli.config.display());
    }

    let result = match cli.command {
        Command::Serve => run_server(config).await,
        Command::Geocode {
            input,
            output,
            errors,
        } => run_geocode(config, input, output, errors).await,
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

async fn run_server(config: AppConfig) -> care_referrals::Result<()> {
    // 驗證配置
    config.validate()?;

    let state = AppState::from_config(config);
    state.seed_admin().await?;
    care_referrals::web::serve(state.shared()).await
}

async fn run_geocode(
    config: AppConfig,
    input: String,
    output: String,
    errors: Option<String>,
) -> care_referrals::Result<()> {
    config.validate_geocoding()?;

    let mut geocoder = GoogleGeocoder::new(&config.geocoding.api_key)
        .with_qualifier(&config.geocoding.qualifier)
        .with_policy(config.retry_policy());
    if let Some(endpoint) = &config.geocoding.endpoint {
        geocoder = geocoder.with_endpoint(endpoint);
    }

    let batch = config.batch_geocoder(Arc::new(geocoder));

    // 相對路徑以目前工作目錄為準
    let storage = LocalStorage::new(".");
    let source = FileResourceSource::new(storage.clone(), input);
    let loader = ResourceLoader::new(Arc::new(source), batch);

    let mut pipeline = GeocodePipeline::new(storage, loader, output);
    if let Some(errors) = errors {
        pipeline = pipeline.with_errors_file(errors);
    }

    let output_path = GeocodeEngine::new(pipeline).run().await?;
    tracing::info!("✅ Geocoding completed successfully!");
    println!("✅ Geocoding completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}

fn exit_with(e: ReferralError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ care-referrals failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}
