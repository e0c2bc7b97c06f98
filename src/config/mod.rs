use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

pub mod validator;

use crate::agents::config::{ProviderConfig, ProviderKind};
use crate::cli::Cli;

/// Prefix for environment overrides, e.g. `PARLEY_ENGINE__MEMORY_CAP=40`
pub const ENV_PREFIX: &str = "PARLEY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub providers: ProvidersSettings,
    pub engine: EngineSettings,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersSettings {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl ProvidersSettings {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::OpenAI => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }
}

impl Default for ProvidersSettings {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::openai_defaults(),
            anthropic: ProviderConfig::anthropic_defaults(),
        }
    }
}

/// Engine tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Messages kept per agent before FIFO eviction
    pub memory_cap: usize,
    /// Iterations used when a collaboration request omits them
    pub default_iterations: u32,
    pub max_iterations: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            memory_cap: crate::agents::domain::DEFAULT_MEMORY_CAP,
            default_iterations: crate::agents::orchestration::DEFAULT_ITERATIONS,
            max_iterations: crate::agents::orchestration::MAX_ITERATIONS,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            providers: ProvidersSettings::default(),
            engine: EngineSettings::default(),
            rate_limit: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_sources(Path::new("parley.toml"), Some(ENV_PREFIX))
    }

    /// Create settings from CLI arguments (config file, environment, then CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let s = Self::builder(&cli.config, Some(ENV_PREFIX))?.build()?;
        let mut settings: Settings = s.try_deserialize()?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    /// Load from a single file without environment overrides
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        Self::from_sources(path, None)
    }

    /// Load from `path` layered with environment variables under `env_prefix`
    pub fn from_sources(path: &Path, env_prefix: Option<&str>) -> Result<Self, anyhow::Error> {
        let settings: Settings = Self::builder(path, env_prefix)?.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn builder(
        path: &Path,
        env_prefix: Option<&str>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>, anyhow::Error> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("engine.memory_cap", defaults.engine.memory_cap as i64)?
            .set_default(
                "engine.default_iterations",
                defaults.engine.default_iterations as i64,
            )?
            .set_default("engine.max_iterations", defaults.engine.max_iterations as i64)?;

        for kind in ProviderKind::ALL {
            let provider = ProviderConfig::defaults_for(kind);
            let key = |field: &str| format!("providers.{}.{}", kind, field);
            builder = builder
                .set_default(key("base_url"), provider.base_url)?
                .set_default(key("requests_per_minute"), provider.requests_per_minute as i64)?
                .set_default(key("default_model"), provider.default_model)?
                .set_default(key("timeout_seconds"), provider.timeout_seconds as i64)?;
            if let Some(var) = provider.api_key_env {
                builder = builder.set_default(key("api_key_env"), var)?;
            }
        }

        builder = builder.add_source(File::from(path.to_path_buf()).required(false));

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        Ok(builder)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(memory_cap) = cli.memory_cap {
            self.engine.memory_cap = memory_cap;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}
