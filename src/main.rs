use webdav_proxy::config::Config;
use webdav_proxy::{logging, webdav};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let _log_guard = logging::init(&config);

    match webdav::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error, shutting down");
            std::process::ExitCode::FAILURE
        }
    }
}
