//! Process entry point: parses flags, loads configuration, wires the
//! render service, and serves the `/v1/pdf` HTTP surface with a
//! graceful-shutdown path that drains in-flight jobs by cancelling them.

mod cli;
mod routes;
mod shutdown;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser as _;
use docrender_adapters::log_sink::StderrLogSink;
use docrender_adapters::logger::{JsonLogger, PrettyLogger};
use docrender_adapters::telemetry::JsonTelemetry;
use docrender_config::LogFormat;
use docrender_facade::{
    LoggerPort, TelemetryPort, build_render_service, load_render_config_std_env,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use cli::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match load_render_config_std_env(cli.config.as_deref(), cli.overrides_json().as_deref())
    {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: failed to load configuration: {error}");
            return std::process::ExitCode::FAILURE;
        },
    };

    let sink = Arc::new(StderrLogSink);
    let logger: Arc<dyn LoggerPort> = match config.as_ref().server.log_format {
        LogFormat::Json => Arc::new(JsonLogger::new(sink.clone())),
        LogFormat::Pretty => Arc::new(PrettyLogger::new(sink.clone())) as Arc<dyn LoggerPort>,
    };
    let telemetry: Arc<dyn TelemetryPort> = Arc::new(JsonTelemetry::new(sink));

    let service = match build_render_service(&config, Arc::clone(&logger), telemetry) {
        Ok(service) => service,
        Err(error) => {
            eprintln!("error: failed to build render service: {error}");
            return std::process::ExitCode::FAILURE;
        },
    };

    let bind_addr = config.as_ref().server.bind.to_string();
    let listener_addr: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(error) => {
            eprintln!("error: invalid bind address '{bind_addr}': {error}");
            return std::process::ExitCode::FAILURE;
        },
    };

    let shutdown = Arc::new(Notify::new());
    let app_state = AppState {
        service,
        queue_timeout_ms: config.as_ref().queue.queue_timeout_ms,
        logger: Arc::clone(&logger),
        shutdown: Arc::clone(&shutdown),
    };

    let router = routes::router(app_state);

    let listener = match TcpListener::bind(listener_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("error: failed to bind {listener_addr}: {error}");
            return std::process::ExitCode::FAILURE;
        },
    };

    logger.info("server.listening", "docrender server listening", None);

    let shutdown_signal = shutdown::wait_for_shutdown_signal(Arc::clone(&shutdown));

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await;

    match serve_result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: server error: {error}");
            std::process::ExitCode::FAILURE
        },
    }
}
