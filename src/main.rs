use std::env;
use std::path::PathBuf;
use std::process;

use wxrelay_service::config::RelayConfig;
use wxrelay_service::logging::{self, LogLevel, Source};
use wxrelay_service::service;

fn main() {
    dotenv::dotenv().ok();

    let level = env::var("RELAY_LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse::<LogLevel>().ok())
        .unwrap_or(LogLevel::Info);
    let log_file = env::var("RELAY_LOG_FILE").ok();
    logging::init_logger(level, log_file.as_deref(), true);

    let config_path = PathBuf::from(env::var("RELAY_CONFIG").unwrap_or_else(|_| "relay.toml".to_string()));
    let config = if config_path.exists() {
        match RelayConfig::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                logging::error(Source::System, Some(&config_path.display().to_string()), &e.to_string());
                process::exit(1);
            }
        }
    } else {
        logging::warn(
            Source::System,
            None,
            &format!("{} not found, using built-in defaults", config_path.display()),
        );
        RelayConfig::default()
    };

    if let Err(e) = service::run(config) {
        logging::error(Source::System, None, &format!("relay stopped: {}", e));
        process::exit(1);
    }
}
