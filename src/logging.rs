//! Inicialização do subscriber de tracing

use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::{ConfigError, ETLError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Monta o filtro: `RUST_LOG` tem precedência sobre o nível configurado
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(level).map_err(|e| {
        ETLError::Config(ConfigError::InvalidValue {
            param: "observability.log_level".to_string(),
            value: format!("{} ({})", level, e),
        })
    })
}

/// Instala o subscriber global no formato configurado.
///
/// Falha se outro subscriber global já tiver sido instalado.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(&config.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| ETLError::Config(ConfigError::InvalidConfig(format!(
        "não foi possível instalar o subscriber de tracing: {}",
        e
    ))))
}
