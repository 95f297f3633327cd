use async_trait::async_trait;
use crate::error::Result;
use crate::schema::{TableName, TableSchema};
use crate::types::{PipelineEvent, Table};

/// Trait para componentes que extraem tabelas de uma fonte
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Lê a tabela descrita por `schema`, mantendo os valores como texto bruto
    async fn extract(&self, schema: &TableSchema) -> Result<Table>;

    /// Descrição da fonte para logs
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Destino persistente das tabelas.
///
/// Toda escrita passa por uma transação: ou todas as etapas da carga
/// são confirmadas, ou nenhuma.
#[async_trait]
pub trait Store: Send + Sync {
    /// Abre uma transação (e a conexão, se ainda não houver uma)
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Libera a conexão
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Transação aberta sobre um `Store`
#[async_trait]
pub trait StoreTransaction: Send {
    /// Remove todas as linhas persistidas da tabela, em cascata
    async fn truncate(&mut self, table: TableName) -> Result<()>;

    /// Insere as linhas da tabela e retorna quantas foram gravadas
    async fn insert(&mut self, table: &Table, schema: &TableSchema) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Trait para emissão de eventos do pipeline
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emite um evento do pipeline
    async fn emit(&self, event: PipelineEvent) -> Result<()>;
}
