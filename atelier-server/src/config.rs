//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Runtime configuration for atelier-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// Path of the sessions JSON document (default: `"sessions.json"`).
    pub sessions_file: PathBuf,

    /// Directory generated images are written to and served from.
    pub generated_dir: PathBuf,

    /// Root URL of the OpenAI-compatible image inference server.
    pub backend_url: String,

    /// Model identifier sent to the inference server.
    pub backend_model: String,

    /// Upper bound on a single generation call.
    pub generation_timeout: Duration,

    /// Width and height of generated images in pixels.
    pub image_size: u32,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are also written to a daily-rotated file in this directory.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("ATELIER_BIND", "0.0.0.0:5000"),
            sessions_file: env_or("ATELIER_SESSIONS_FILE", "sessions.json").into(),
            generated_dir: env_or("ATELIER_GENERATED_DIR", "static/generated").into(),
            backend_url: env_or("ATELIER_BACKEND_URL", "http://127.0.0.1:3000"),
            backend_model: env_or("ATELIER_BACKEND_MODEL", "stable-diffusion-xl"),
            generation_timeout: Duration::from_secs(parse_env(
                "ATELIER_GENERATION_TIMEOUT_SECS",
                300,
            )),
            image_size: parse_env("ATELIER_IMAGE_SIZE", 880),
            log_level: env_or("ATELIER_LOG", "info"),
            log_json: env_flag("ATELIER_LOG_JSON", false),
            log_dir: std::env::var("ATELIER_LOG_DIR").ok().map(PathBuf::from),
            cors_allowed_origins: std::env::var("ATELIER_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("ATELIER_ENABLE_SWAGGER", true),
        }
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind_address = bind;
        }
        if let Some(path) = cli.sessions_file {
            self.sessions_file = path;
        }
        if let Some(dir) = cli.generated_dir {
            self.generated_dir = dir;
        }
        if let Some(url) = cli.backend_url {
            self.backend_url = url;
        }
        self
    }
}

/// Command-line flags; each one overrides its `ATELIER_*` variable.
#[derive(Debug, Default, Parser)]
#[command(name = "atelier-server", version, about = "Conversational image generation server")]
pub struct Cli {
    /// Address to bind, e.g. 127.0.0.1:5000.
    #[arg(long)]
    pub bind: Option<String>,

    /// Sessions JSON document.
    #[arg(long)]
    pub sessions_file: Option<PathBuf>,

    /// Directory for generated images.
    #[arg(long)]
    pub generated_dir: Option<PathBuf>,

    /// Root URL of the image inference server.
    #[arg(long)]
    pub backend_url: Option<String>,
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
