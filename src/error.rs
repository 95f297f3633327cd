use thiserror::Error;
use crate::schema::TableName;

/// Tipo Result principal da biblioteca
pub type Result<T> = std::result::Result<T, ETLError>;

/// Erro principal do pipeline acadêmico
#[derive(Error, Debug)]
pub enum ETLError {
    #[error("Erro de extração: {0}")]
    Extract(#[from] ExtractError),

    #[error("Erro de validação: {0}")]
    Validation(#[from] ValidationError),

    #[error("Erro de carga: {0}")]
    Load(#[from] LoadError),

    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),

    #[error("Erro de catálogo: {0}")]
    Schema(#[from] SchemaError),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Erros relacionados à leitura das fontes
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Fonte ausente para a tabela {table}: {path}")]
    SourceMissing { table: TableName, path: String },

    #[error("Fonte ilegível para a tabela {table}: {reason}")]
    Unreadable { table: TableName, reason: String },

    #[error("Formato inválido: {0}")]
    InvalidFormat(String),

    #[error("Erro de parsing: {0}")]
    ParseError(String),
}

/// Falhas de validação; todas abortam a execução antes de tocar o banco
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{table}: colunas ausentes: {columns:?}")]
    MissingColumns { table: TableName, columns: Vec<String> },

    #[error("{table}: valores nulos em colunas obrigatórias: {columns:?}")]
    NullValues { table: TableName, columns: Vec<String> },

    #[error("{table}.{column}: valor inválido {value:?} na linha {row}")]
    InvalidValue {
        table: TableName,
        column: String,
        row: usize,
        value: String,
    },

    #[error("{table}.{column}: {reason} ({samples:?})")]
    Domain {
        table: TableName,
        column: String,
        reason: String,
        samples: Vec<String>,
    },

    #[error("integridade referencial: {removed} linhas órfãs em modo estrito ({details})")]
    ReferentialIntegrity { removed: usize, details: String },
}

/// Erros relacionados à persistência
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Erro de conexão com o banco: {0}")]
    Connection(String),

    #[error("Erro de banco de dados: {0}")]
    Database(String),

    #[error("Falha ao carregar {table}: {reason}")]
    TableFailed { table: TableName, reason: String },

    #[error("Transação já encerrada")]
    TransactionClosed,
}

/// Erros relacionados à configuração
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingRequiredParameter(String),

    #[error("Valor inválido para {param}: {value}")]
    InvalidValue { param: String, value: String },

    #[error("Erro de parsing de configuração: {0}")]
    ParseError(String),
}

/// Erros na definição do catálogo de tabelas
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{table} referencia a tabela {parent}, que não está no catálogo")]
    UnknownParent { table: TableName, parent: TableName },

    #[error("dependência circular entre tabelas: {0}")]
    Cycle(String),

    #[error("tabela {0} declarada mais de uma vez")]
    Duplicate(TableName),

    #[error("tabela {0} não está no catálogo")]
    UnknownTable(TableName),
}

impl ETLError {
    /// Falhas de fonte ou de validação: nada foi persistido
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, ETLError::Extract(_) | ETLError::Validation(_))
    }

    /// Falhas durante a escrita no banco
    pub fn is_load_failure(&self) -> bool {
        matches!(self, ETLError::Load(_))
    }

    /// Retorna o código de erro
    pub fn error_code(&self) -> &'static str {
        match self {
            ETLError::Extract(ExtractError::SourceMissing { .. }) => "SOURCE_MISSING",
            ETLError::Extract(_) => "EXTRACT_ERROR",
            ETLError::Validation(ValidationError::MissingColumns { .. })
            | ETLError::Validation(ValidationError::NullValues { .. })
            | ETLError::Validation(ValidationError::InvalidValue { .. }) => "SCHEMA_VALIDATION_FAILURE",
            ETLError::Validation(ValidationError::Domain { .. }) => "DOMAIN_VALIDATION_FAILURE",
            ETLError::Validation(ValidationError::ReferentialIntegrity { .. }) => "REFERENTIAL_INTEGRITY_FAILURE",
            ETLError::Load(_) => "LOAD_FAILURE",
            ETLError::Config(_) => "CONFIG_ERROR",
            ETLError::Schema(_) => "SCHEMA_ERROR",
            ETLError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<config::ConfigError> for ETLError {
    fn from(err: config::ConfigError) -> Self {
        ETLError::Config(ConfigError::ParseError(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ETLError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                ETLError::Load(LoadError::Database(db_err.to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ETLError::Load(LoadError::Connection(err.to_string()))
            }
            sqlx::Error::Io(io_err) => ETLError::Load(LoadError::Connection(io_err.to_string())),
            _ => ETLError::Load(LoadError::Database(err.to_string())),
        }
    }
}

impl From<csv::Error> for ETLError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io_err) => ETLError::Io(std::io::Error::new(io_err.kind(), io_err.to_string())),
            csv::ErrorKind::Utf8 { .. } => {
                ETLError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            }
            _ => ETLError::Extract(ExtractError::ParseError(err.to_string())),
        }
    }
}
