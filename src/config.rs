use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuração principal do ETL
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ETLConfig {
    pub source: SourceConfig,
    pub database: DatabaseConfig,
    pub validation: ValidationConfig,
    pub observability: ObservabilityConfig,
}

/// Onde estão os CSVs de origem
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub data_dir: PathBuf,
    pub delimiter: char,
}

/// Parâmetros de conexão com o PostgreSQL
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Quando presente, substitui host/porta/nome/usuário/senha
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub acquire_timeout_seconds: u64,
    pub insert_batch_size: usize,
}

/// Políticas de validação
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub referential_mode: ReferentialMode,
    pub grade_policy: GradePolicy,
}

/// O que fazer quando o reparo referencial remove linhas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferentialMode {
    /// Remove as órfãs, registra e segue para a carga
    #[default]
    Lenient,
    /// Remove as órfãs e aborta antes da carga
    Strict,
}

/// Tratamento de notas fora de [0, 100]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradePolicy {
    #[default]
    Clamp,
    Reject,
}

/// Configuração de observabilidade
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Formato de log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            delimiter: ',',
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            name: "student_records_db".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            acquire_timeout_seconds: 30,
            insert_batch_size: 1000,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("acquire_timeout_seconds", &self.acquire_timeout_seconds)
            .field("insert_batch_size", &self.insert_batch_size)
            .finish()
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl SourceConfig {
    /// Delimitador como byte; o leitor CSV só aceita delimitadores ASCII
    pub fn delimiter_byte(&self) -> Result<u8, crate::error::ETLError> {
        use crate::error::{ETLError, ConfigError};

        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ETLError::Config(ConfigError::InvalidValue {
                    param: "source.delimiter".to_string(),
                    value: self.delimiter.to_string(),
                })
            })
    }
}

impl ETLConfig {
    /// Cria um novo builder para configuração
    pub fn builder() -> ETLConfigBuilder {
        ETLConfigBuilder::default()
    }

    /// Carrega configuração do ambiente sobre os valores padrão
    pub fn from_env() -> Result<Self, crate::error::ETLError> {
        Self::builder().with_env()?.build()
    }

    /// Carrega configuração de arquivo
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::error::ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Carrega configuração de string TOML
    pub fn from_toml(toml_str: &str) -> Result<Self, crate::error::ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Valida a configuração
    pub fn validate(&self) -> Result<(), crate::error::ETLError> {
        use crate::error::{ETLError, ConfigError};

        if self.source.data_dir.as_os_str().is_empty() {
            return Err(ETLError::Config(ConfigError::MissingRequiredParameter(
                "source.data_dir".to_string(),
            )));
        }

        self.source.delimiter_byte()?;

        if self.database.insert_batch_size == 0 {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "database.insert_batch_size".to_string(),
                value: "0".to_string(),
            }));
        }

        if self.database.port == 0 {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "database.port".to_string(),
                value: "0".to_string(),
            }));
        }

        Ok(())
    }
}

/// Builder para configuração ETL
#[derive(Default)]
pub struct ETLConfigBuilder {
    config: ETLConfig,
}

impl ETLConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parte de uma configuração já carregada (por exemplo, de arquivo)
    pub fn from_config(config: ETLConfig) -> Self {
        Self { config }
    }

    /// Aplica as variáveis de ambiente reconhecidas
    pub fn with_env(mut self) -> Result<Self, crate::error::ETLError> {
        use crate::error::{ETLError, ConfigError};

        if let Ok(dir) = std::env::var("ACADETL_DATA_DIR") {
            self = self.data_dir(dir);
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self = self.database_url(url);
        }

        if let Ok(host) = std::env::var("ACADETL_DB_HOST") {
            self.config.database.host = host;
        }

        if let Ok(port) = std::env::var("ACADETL_DB_PORT") {
            self.config.database.port = port.parse::<u16>().map_err(|_| {
                ETLError::Config(ConfigError::InvalidValue {
                    param: "ACADETL_DB_PORT".to_string(),
                    value: port.clone(),
                })
            })?;
        }

        if let Ok(name) = std::env::var("ACADETL_DB_NAME") {
            self.config.database.name = name;
        }

        if let Ok(user) = std::env::var("ACADETL_DB_USER") {
            self.config.database.user = user;
        }

        if let Ok(password) = std::env::var("ACADETL_DB_PASSWORD") {
            self.config.database.password = password;
        }

        if let Ok(strict) = std::env::var("ACADETL_STRICT_REFERENCES") {
            if let Ok(enable) = strict.parse::<bool>() {
                self = self.strict_references(enable);
            }
        }

        if let Ok(policy) = std::env::var("ACADETL_GRADE_POLICY") {
            let policy = match policy.to_lowercase().as_str() {
                "clamp" => GradePolicy::Clamp,
                "reject" => GradePolicy::Reject,
                _ => {
                    return Err(ETLError::Config(ConfigError::InvalidValue {
                        param: "ACADETL_GRADE_POLICY".to_string(),
                        value: policy,
                    }))
                }
            };
            self = self.grade_policy(policy);
        }

        if let Ok(level) = std::env::var("ACADETL_LOG_LEVEL") {
            self = self.log_level(level);
        }

        Ok(self)
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.source.data_dir = dir.into();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.source.delimiter = delimiter;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn insert_batch_size(mut self, size: usize) -> Self {
        self.config.database.insert_batch_size = size;
        self
    }

    pub fn strict_references(mut self, strict: bool) -> Self {
        self.config.validation.referential_mode = if strict {
            ReferentialMode::Strict
        } else {
            ReferentialMode::Lenient
        };
        self
    }

    pub fn grade_policy(mut self, policy: GradePolicy) -> Self {
        self.config.validation.grade_policy = policy;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.observability.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.observability.log_format = format;
        self
    }

    pub fn build(self) -> Result<ETLConfig, crate::error::ETLError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ETLConfig::default();
        assert_eq!(config.source.data_dir, PathBuf::from("data"));
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.validation.referential_mode, ReferentialMode::Lenient);
        assert_eq!(config.validation.grade_policy, GradePolicy::Clamp);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_builder() {
        let config = ETLConfig::builder()
            .data_dir("/srv/csv")
            .strict_references(true)
            .grade_policy(GradePolicy::Reject)
            .insert_batch_size(250)
            .log_level("debug")
            .build()
            .unwrap();

        assert_eq!(config.source.data_dir, PathBuf::from("/srv/csv"));
        assert_eq!(config.validation.referential_mode, ReferentialMode::Strict);
        assert_eq!(config.validation.grade_policy, GradePolicy::Reject);
        assert_eq!(config.database.insert_batch_size, 250);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_config_validation() {
        let mut config = ETLConfig::default();
        config.database.insert_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = ETLConfig::default();
        config.source.data_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = ETLConfig::default();
        config.source.delimiter = '§';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delimiter_byte() {
        let mut source = SourceConfig::default();
        assert_eq!(source.delimiter_byte().unwrap(), b',');

        source.delimiter = ';';
        assert_eq!(source.delimiter_byte().unwrap(), b';');

        // Latin-1 cabe em u8, mas não é ASCII
        source.delimiter = 'é';
        let err = source.delimiter_byte().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
        [source]
        data_dir = "../data"

        [database]
        host = "db.internal"
        port = 6543
        name = "records"

        [validation]
        referential_mode = "strict"
        grade_policy = "reject"

        [observability]
        log_format = "json"
        "#;

        let config = ETLConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.source.data_dir, PathBuf::from("../data"));
        assert_eq!(config.source.delimiter, ',');
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.insert_batch_size, 1000);
        assert_eq!(config.validation.referential_mode, ReferentialMode::Strict);
        assert_eq!(config.validation.grade_policy, GradePolicy::Reject);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_from_empty_toml_uses_defaults() {
        let config = ETLConfig::from_toml("").unwrap();
        assert_eq!(config.database.name, "student_records_db");
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = DatabaseConfig::default();
        config.password = "s3cret".to_string();
        assert!(!format!("{:?}", config).contains("s3cret"));
    }
}
