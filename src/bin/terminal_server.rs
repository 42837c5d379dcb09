use std::sync::Arc;

use ai_bookkeeper::config::Settings;
use ai_bookkeeper::servers::terminal;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Arc::new(Settings::from_env());
    let server = terminal::build_server(settings);
    if let Err(err) = server.run_stdio().await {
        log::error!("terminal server failed: {}", err);
        std::process::exit(1);
    }
}
