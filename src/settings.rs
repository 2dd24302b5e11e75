use std::{env, net::IpAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

const ENV_ENDEE_URL: &str = "ENDEE_URL";
const ENV_ENDEE_AUTH_TOKEN: &str = "ENDEE_AUTH_TOKEN";
const ENV_ENDEE_TIMEOUT_SECS: &str = "ENDEE_TIMEOUT_SECS";
const ENV_EMBEDDING_PROVIDER: &str = "EMBEDDING_PROVIDER";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_OPENAI_MODEL: &str = "OPENAI_EMBEDDING_MODEL";
const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_LOCAL_MODEL: &str = "LOCAL_EMBEDDING_MODEL";
const ENV_PRELOAD_LOCAL: &str = "PRELOAD_LOCAL_MODEL";
const ENV_TRANSPORT: &str = "MCP_TRANSPORT";
const ENV_SSE_HOST: &str = "MCP_SSE_HOST";
const ENV_SSE_PORT: &str = "MCP_SSE_PORT";
const ENV_SSE_KEEP_ALIVE_SECS: &str = "MCP_SSE_KEEP_ALIVE_SECS";
const ENV_LOG: &str = "ENDEE_MCP_LOG";

pub const DEFAULT_ENDEE_URL: &str = "http://localhost:8080";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Requested embedding provider, before credentials are taken into account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    #[default]
    Auto,
    OpenAi,
    Local,
    None,
}

impl ProviderMode {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderMode::Auto => "auto",
            ProviderMode::OpenAi => "openai",
            ProviderMode::Local => "local",
            ProviderMode::None => "none",
        }
    }

    /// `auto` picks OpenAI when a non-empty key is present, local otherwise.
    pub fn resolve(&self, openai_key: &str) -> ProviderKind {
        match self {
            ProviderMode::Auto if !openai_key.trim().is_empty() => ProviderKind::OpenAi,
            ProviderMode::Auto => ProviderKind::Local,
            ProviderMode::OpenAi => ProviderKind::OpenAi,
            ProviderMode::Local => ProviderKind::Local,
            ProviderMode::None => ProviderKind::Disabled,
        }
    }
}

impl FromStr for ProviderMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(ProviderMode::Auto),
            "openai" => Ok(ProviderMode::OpenAi),
            "local" => Ok(ProviderMode::Local),
            "none" => Ok(ProviderMode::None),
            other => Err(anyhow!(
                "unknown embedding provider `{other}` (expected auto, openai, local or none)"
            )),
        }
    }
}

/// Provider actually constructed after resolving [`ProviderMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Local,
    #[serde(rename = "none")]
    Disabled,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Local => "local",
            ProviderKind::Disabled => "none",
        }
    }
}

/// MCP transport the binary listens on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Sse,
}

impl Transport {
    pub fn id(&self) -> &'static str {
        match self {
            Transport::Stdio => "stdio",
            Transport::Sse => "sse",
        }
    }
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stdio" | "" => Ok(Transport::Stdio),
            "sse" => Ok(Transport::Sse),
            other => Err(anyhow!("unknown MCP transport `{other}` (expected stdio or sse)")),
        }
    }
}

/// Connection settings for the Endee service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndeeSettings {
    pub url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl EndeeSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn is_auth_enabled(&self) -> bool {
        self.auth_token.is_some()
    }
}

/// Everything the provider selector needs to build a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSettings {
    pub mode: ProviderMode,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub local_model: String,
    pub preload_local: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            mode: ProviderMode::Auto,
            openai_api_key: String::new(),
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            local_model: DEFAULT_LOCAL_MODEL.into(),
            preload_local: false,
        }
    }
}

impl EmbeddingSettings {
    pub fn with_mode(mode: ProviderMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn is_openai_configured(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }

    pub fn resolved_kind(&self) -> ProviderKind {
        self.mode.resolve(&self.openai_api_key)
    }
}

/// SSE listener settings, only used when the transport is `sse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseSettings {
    pub host: IpAddr,
    pub port: u16,
    pub keep_alive: Duration,
}

impl Default for SseSettings {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endee: EndeeSettings,
    pub embedding: EmbeddingSettings,
    pub transport: Transport,
    pub sse: SseSettings,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endee: EndeeSettings::new(DEFAULT_ENDEE_URL),
            embedding: EmbeddingSettings::default(),
            transport: Transport::Stdio,
            sse: SseSettings::default(),
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup(ENV_ENDEE_URL).filter(|v| !v.trim().is_empty()) {
            cfg.endee.url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup(ENV_ENDEE_AUTH_TOKEN) {
            cfg.endee = cfg.endee.with_auth_token(token);
        }
        if let Some(raw) = lookup(ENV_ENDEE_TIMEOUT_SECS) {
            let seconds = parse_number::<u64>(ENV_ENDEE_TIMEOUT_SECS, &raw)?;
            cfg.endee.timeout = Duration::from_secs(seconds.max(1));
        }

        if let Some(raw) = lookup(ENV_EMBEDDING_PROVIDER) {
            cfg.embedding.mode = raw.parse().context("invalid EMBEDDING_PROVIDER")?;
        }
        if let Some(key) = lookup(ENV_OPENAI_API_KEY) {
            cfg.embedding.openai_api_key = key.trim().to_string();
        }
        if let Some(model) = lookup(ENV_OPENAI_MODEL).filter(|v| !v.trim().is_empty()) {
            cfg.embedding.openai_model = model.trim().to_string();
        }
        if let Some(url) = lookup(ENV_OPENAI_BASE_URL).filter(|v| !v.trim().is_empty()) {
            cfg.embedding.openai_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup(ENV_LOCAL_MODEL).filter(|v| !v.trim().is_empty()) {
            cfg.embedding.local_model = model.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_PRELOAD_LOCAL) {
            cfg.embedding.preload_local = raw.trim().eq_ignore_ascii_case("true");
        }

        if let Some(raw) = lookup(ENV_TRANSPORT) {
            cfg.transport = raw.parse().context("invalid MCP_TRANSPORT")?;
        }
        if let Some(raw) = lookup(ENV_SSE_HOST).filter(|v| !v.trim().is_empty()) {
            cfg.sse.host = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_SSE_HOST} `{raw}`"))?;
        }
        if let Some(raw) = lookup(ENV_SSE_PORT) {
            cfg.sse.port = parse_number::<u16>(ENV_SSE_PORT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SSE_KEEP_ALIVE_SECS) {
            let seconds = parse_number::<u64>(ENV_SSE_KEEP_ALIVE_SECS, &raw)?;
            cfg.sse.keep_alive = Duration::from_secs(seconds.max(5));
        }

        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            cfg.log_filter = filter;
        }

        if !cfg.endee.url.starts_with("http://") && !cfg.endee.url.starts_with("https://") {
            bail!("{ENV_ENDEE_URL} must be an http(s) URL, got `{}`", cfg.endee.url);
        }

        Ok(cfg)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid {key} `{raw}`"))
}
