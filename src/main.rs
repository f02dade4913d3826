use chord_degrees::core::startup;
use chord_degrees::utils::{logger, validation::Validate};
use chord_degrees::{ServeArgs, ServerConfig};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = ServeArgs::parse();

    let config = match ServerConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            return ExitCode::from(e.exit_code());
        }
    };

    // 初始化日誌
    logger::init_server_logger(config.verbose, config.log_json);

    tracing::info!("Starting chord-degrees server");
    tracing::debug!("Server config: {:?}", ServerConfig {
        secret_key: "<redacted>".to_string(),
        ..config.clone()
    });

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return ExitCode::from(e.exit_code());
    }

    if config.uses_development_secret() {
        tracing::warn!("⚠️ SECRET_KEY is not set, session cookies use the development key");
    }

    match startup::launch(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(
                "❌ Server failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            ExitCode::from(e.exit_code())
        }
    }
}
