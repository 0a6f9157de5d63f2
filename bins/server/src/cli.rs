//! Command-line flags for the docrender server.

use std::path::PathBuf;

use clap::Parser;

/// Bounded-concurrency render orchestrator that serves wiki articles as
/// PDFs over HTTP.
#[derive(Debug, Parser)]
#[command(
    name = "docrender-server",
    version,
    about = "Render wiki articles to PDF over HTTP",
    long_about = None
)]
pub struct Cli {
    /// Path to a JSON or TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override `server.bind`, e.g. `0.0.0.0:8080`.
    #[arg(long)]
    pub bind: Option<String>,
    /// Override `server.logFormat` (`json` or `pretty`).
    #[arg(long = "log-format")]
    pub log_format: Option<String>,
}

impl Cli {
    /// Build the JSON config overrides this invocation implies, if any.
    ///
    /// Shaped to match [`docrender_config`]'s `server`-section overrides
    /// schema so it can be handed straight to
    /// [`docrender_facade::load_render_config_std_env`].
    #[must_use]
    pub fn overrides_json(&self) -> Option<String> {
        if self.bind.is_none() && self.log_format.is_none() {
            return None;
        }

        let mut server = serde_json::Map::new();
        if let Some(bind) = &self.bind {
            server.insert(
                "bind".to_string(),
                serde_json::Value::String(bind.clone()),
            );
        }
        if let Some(log_format) = &self.log_format {
            server.insert(
                "logFormat".to_string(),
                serde_json::Value::String(log_format.clone()),
            );
        }

        let payload = serde_json::json!({ "server": serde_json::Value::Object(server) });
        Some(payload.to_string())
    }
}
