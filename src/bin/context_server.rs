use ai_bookkeeper::servers::context;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let server = context::build_server();
    if let Err(err) = server.run_stdio().await {
        log::error!("context server failed: {}", err);
        std::process::exit(1);
    }
}
