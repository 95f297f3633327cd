//! Store PostgreSQL via sqlx
//!
//! A estrutura das tabelas (DDL) já existe no banco; aqui só se esvazia e
//! se insere conteúdo.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, Postgres};
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use crate::config::DatabaseConfig;
use crate::error::{ConfigError, ETLError, LoadError, Result};
use crate::schema::{ColumnType, TableName, TableSchema};
use crate::traits::{Store, StoreTransaction};
use crate::types::{DataValue, Table};

/// Store sobre um pool preguiçoso de uma única conexão.
///
/// A conexão só é aberta no primeiro `begin` (isto é, no estágio de carga)
/// e é liberada por `close`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgStore {
    /// Prepara o pool sem conectar
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let options = match &config.url {
            Some(url) => PgConnectOptions::from_str(url).map_err(|_| {
                ETLError::Config(ConfigError::InvalidValue {
                    param: "database.url".to_string(),
                    value: "<redacted>".to_string(),
                })
            })?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .database(&config.name)
                .username(&config.user)
                .password(&config.password),
        };

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            batch_size: config.insert_batch_size.max(1),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(|e| match ETLError::from(e) {
            ETLError::Load(LoadError::Database(msg)) => ETLError::Load(LoadError::Connection(msg)),
            other => other,
        })?;
        info!("Conexão com o banco adquirida; transação aberta");

        Ok(Box::new(PgTransaction {
            tx: Some(tx),
            batch_size: self.batch_size,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        debug!("Pool de conexões encerrado");
        Ok(())
    }
}

/// Transação aberta no PostgreSQL
pub struct PgTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    batch_size: usize,
}

impl PgTransaction {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| LoadError::TransactionClosed.into())
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn truncate(&mut self, table: TableName) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {} CASCADE", quote_ident(table.as_str()));
        let tx = self.tx()?;
        sqlx::query(&sql).execute(&mut **tx).await?;
        debug!(table = %table, "Tabela esvaziada");
        Ok(())
    }

    async fn insert(&mut self, table: &Table, schema: &TableSchema) -> Result<u64> {
        if table.is_empty() {
            return Ok(0);
        }

        let columns: Vec<String> = schema.columns.iter().map(|c| quote_ident(c.name)).collect();
        let prefix = format!(
            "INSERT INTO {} ({}) ",
            quote_ident(schema.name.as_str()),
            columns.join(", ")
        );

        let batch_size = rows_per_statement(self.batch_size, schema.columns.len());
        let tx = self.tx()?;
        let mut inserted = 0u64;

        for chunk in table.rows.chunks(batch_size) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(&prefix);
            builder.push_values(chunk, |mut b, row| {
                for column in &schema.columns {
                    bind_value(&mut b, row.get(column.name), column.column_type);
                }
            });

            let result = builder.build().execute(&mut **tx).await?;
            inserted += result.rows_affected();
        }

        debug!(table = %schema.name, rows = inserted, "Linhas inseridas");
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(LoadError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(LoadError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

/// Limite de parâmetros vinculados por comando no protocolo do PostgreSQL
const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

/// Linhas por INSERT: o lote configurado, limitado para que
/// `linhas × colunas` não passe de `MAX_BIND_PARAMETERS`
fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
    let limit = MAX_BIND_PARAMETERS / columns.max(1);
    batch_size.clamp(1, limit.max(1))
}

/// Vincula o valor com o tipo da coluna, inclusive quando é nulo
fn bind_value(
    b: &mut Separated<'_, '_, Postgres, &'static str>,
    value: Option<&DataValue>,
    column_type: ColumnType,
) {
    match column_type {
        ColumnType::Integer => {
            b.push_bind(value.and_then(DataValue::as_integer));
        }
        ColumnType::Text => {
            b.push_bind(value.and_then(DataValue::as_string));
        }
        ColumnType::Date => {
            b.push_bind(value.and_then(DataValue::as_date));
        }
        ColumnType::Timestamp => {
            b.push_bind(value.and_then(DataValue::as_datetime));
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("grades"), "\"grades\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_rows_per_statement_respects_parameter_limit() {
        // students tem 7 colunas: 9362 × 7 = 65534
        assert_eq!(rows_per_statement(10_000, 7), 9362);
        assert!(rows_per_statement(10_000, 7) * 7 <= MAX_BIND_PARAMETERS);
        assert_eq!(rows_per_statement(1000, 7), 1000);
        assert_eq!(rows_per_statement(0, 5), 1);
        assert_eq!(rows_per_statement(500, 0), 500);
    }

    #[tokio::test]
    async fn test_connect_lazy_does_not_touch_the_network() {
        let config = DatabaseConfig {
            host: "db.invalid".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(PgStore::connect_lazy(&config).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let config = DatabaseConfig {
            url: Some("não é uma url".to_string()),
            ..DatabaseConfig::default()
        };
        let err = PgStore::connect_lazy(&config).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
