//! Tool server configuration.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` but can be set with the `-f` flag or the `MEDIAMCP_CONFIG` environment
//! variable. A missing file is fine: every setting has a default except the provider keys.
//!
//! ## Loading Priority
//!
//! Sources are merged in this order (later sources override earlier ones):
//!
//! 1. **Built-in defaults**
//! 2. **YAML config file** (default: `config.yaml`)
//! 3. **`MEDIAMCP_` environment variables**, with `__` for nesting (`MEDIAMCP_FAL__BASE_URL`)
//! 4. **Plain environment variables** shared with the rest of the platform: `API_BASE_URL`,
//!    `GEMINI_API_KEY`, `FAL_KEY`, `HTTP_CONNECT_TIMEOUT`, `HTTP_READ_TIMEOUT`,
//!    `AI_HTTP_CONNECT_TIMEOUT`, `AI_HTTP_READ_TIMEOUT`
//! 5. **CLI flags** `--tool` and `--port`
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! tools: [bria_genfill]
//! api_base_url: https://app.example.com/api/v1
//! auth:
//!   mode: remote
//!   validate_path: /auth/me
//! ai_http:
//!   read_timeout_secs: 300
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::{Provider, ToolKind};

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_FAL_BASE_URL: &str = "https://fal.run";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image";

/// Plain environment variables and the config keys they set.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("API_BASE_URL", "api_base_url"),
    ("GEMINI_API_KEY", "gemini.api_key"),
    ("FAL_KEY", "fal.api_key"),
    ("HTTP_CONNECT_TIMEOUT", "http.connect_timeout_secs"),
    ("HTTP_READ_TIMEOUT", "http.read_timeout_secs"),
    ("AI_HTTP_CONNECT_TIMEOUT", "ai_http.connect_timeout_secs"),
    ("AI_HTTP_READ_TIMEOUT", "ai_http.read_timeout_secs"),
];

/// CLI args
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MEDIAMCP_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Tool to serve. Repeat to serve several tools from one process.
    #[arg(long, value_enum)]
    pub tool: Vec<ToolKind>,

    /// Port to listen on. Defaults to the first tool's well-known port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Root configuration. Immutable once loaded; shared read-only by every request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface to bind (e.g. "0.0.0.0" for all interfaces)
    pub host: String,
    /// Port override. When unset the first served tool's default port is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Tools served by this process
    pub tools: Vec<ToolKind>,
    /// Backend base URL for token validation and upload tickets
    pub api_base_url: Url,
    pub auth: AuthConfig,
    /// Timeouts for backend, download and storage traffic
    pub http: TimeoutConfig,
    /// Timeouts for inference provider calls
    pub ai_http: TimeoutConfig,
    pub gemini: GeminiConfig,
    pub fal: FalConfig,
    /// Export traces over OTLP (configured through the standard `OTEL_*` variables)
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            tools: Vec::new(),
            api_base_url: parse_default(DEFAULT_API_BASE_URL),
            auth: AuthConfig::default(),
            http: TimeoutConfig {
                connect_timeout_secs: 15,
                read_timeout_secs: 60,
            },
            ai_http: TimeoutConfig {
                connect_timeout_secs: 15,
                read_timeout_secs: 180,
            },
            gemini: GeminiConfig::default(),
            fal: FalConfig::default(),
            enable_otel_export: false,
        }
    }
}

fn parse_default(url: &str) -> Url {
    Url::parse(url).expect("built-in default URL is valid")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Confirm every token with the backend
    #[default]
    Remote,
    /// Only check that a well-formed bearer token is present
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Path under `api_base_url` that answers 2xx for a valid token
    pub validate_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Remote,
            validate_path: "/auth/me".to_string(),
        }
    }
}

/// Connect/read timeout pair, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: Url,
    /// Image-capable model used for restoration
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: parse_default(DEFAULT_GEMINI_BASE_URL),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Synchronous run endpoint; model ids are appended as path segments
    pub base_url: Url,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: parse_default(DEFAULT_FAL_BASE_URL),
        }
    }
}

impl std::fmt::Debug for FalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // CLI flags win over every other source
        if !args.tool.is_empty() {
            config.tools = args.tool.clone();
        }
        if let Some(port) = args.port {
            config.port = Some(port);
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        config
            .validate_for_tools(&config.tools)
            .map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("MEDIAMCP_").split("__").ignore(&["config"]));

        for (var, key) in LEGACY_ENV_VARS {
            figment = figment.merge(Env::raw().only(&[*var]).map(move |_| (*key).into()));
        }
        figment
    }

    /// Check values that are wrong regardless of which tools are served.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tools.is_empty() {
            anyhow::bail!("Config validation: no tools selected. Pass --tool or set `tools` in the config file.");
        }

        for (name, timeouts) in [("http", &self.http), ("ai_http", &self.ai_http)] {
            if timeouts.connect_timeout_secs == 0 || timeouts.read_timeout_secs == 0 {
                anyhow::bail!("Config validation: {name} timeouts must be greater than zero");
            }
        }

        for (name, url) in [
            ("api_base_url", &self.api_base_url),
            ("fal.base_url", &self.fal.base_url),
            ("gemini.base_url", &self.gemini.base_url),
        ] {
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("Config validation: {name} must be an http(s) URL, got scheme '{}'", url.scheme());
            }
        }

        if !self.auth.validate_path.starts_with('/') {
            anyhow::bail!(
                "Config validation: auth.validate_path must start with '/', got '{}'",
                self.auth.validate_path
            );
        }

        Ok(())
    }

    /// Fail fast when a served tool needs a provider key that is not configured.
    pub fn validate_for_tools(&self, tools: &[ToolKind]) -> anyhow::Result<()> {
        for tool in tools {
            let (configured, variable) = match tool.provider() {
                Provider::InProcess => continue,
                Provider::Gemini => (has_key(&self.gemini.api_key), "GEMINI_API_KEY"),
                Provider::Fal => (has_key(&self.fal.api_key), "FAL_KEY"),
            };
            if !configured {
                anyhow::bail!(
                    "Config validation: tool '{}' requires {variable} to be set",
                    tool.name()
                );
            }
        }
        Ok(())
    }

    /// Port to listen on: the explicit override, else the first tool's default.
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| self.tools.first().map(|t| t.default_port()))
            .unwrap_or(9001)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }
}

fn has_key(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.trim().is_empty())
}
