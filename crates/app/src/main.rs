use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with the chat on stdout.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match scenechat::run_app().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "scenechat stopped");
            eprintln!("scenechat: {error}");
            ExitCode::FAILURE
        }
    }
}
