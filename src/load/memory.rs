//! # Memory Store
//!
//! Persistência em memória com transações isoladas por cópia.
//! Especialmente útil para testes e para execuções de simulação (`--dry-run`).

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::error::{LoadError, Result};
use crate::schema::{Catalog, TableName, TableSchema};
use crate::traits::{Store, StoreTransaction};
use crate::types::{DataRow, DataValue, Table};

/// Operação registrada no diário do store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Begin,
    Truncate(TableName),
    Insert(TableName, usize),
    Commit,
    Rollback,
    Close,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<TableName, Vec<DataRow>>,
    journal: Vec<StoreOperation>,
    fail_on: Option<TableName>,
}

/// Store que mantém as tabelas em memória
///
/// Cada transação trabalha sobre uma cópia das tabelas; só o `commit`
/// publica as alterações. Clones compartilham o mesmo estado.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    catalog: Option<Arc<Catalog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passa a verificar chaves estrangeiras na inserção, como o banco faria
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Faz as inserções nesta tabela falharem até `clear_failure`
    pub fn fail_on(&self, table: TableName) {
        self.lock().fail_on = Some(table);
    }

    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    /// Linhas persistidas (confirmadas) da tabela
    pub fn rows(&self, table: TableName) -> Vec<DataRow> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: TableName) -> usize {
        self.lock().tables.get(&table).map_or(0, Vec::len)
    }

    /// Contagem de linhas de todas as tabelas persistidas
    pub fn row_counts(&self) -> BTreeMap<TableName, usize> {
        self.lock()
            .tables
            .iter()
            .map(|(name, rows)| (*name, rows.len()))
            .collect()
    }

    /// Diário de operações desde a criação
    pub fn journal(&self) -> Vec<StoreOperation> {
        self.lock().journal.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let snapshot = {
            let mut state = self.lock();
            state.journal.push(StoreOperation::Begin);
            state.tables.clone()
        };

        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            catalog: self.catalog.clone(),
            working: Some(snapshot),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.lock().journal.push(StoreOperation::Close);
        Ok(())
    }
}

/// Transação sobre um `MemoryStore`
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    catalog: Option<Arc<Catalog>>,
    working: Option<BTreeMap<TableName, Vec<DataRow>>>,
}

impl MemoryTransaction {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn working(&mut self) -> Result<&mut BTreeMap<TableName, Vec<DataRow>>> {
        self.working
            .as_mut()
            .ok_or_else(|| LoadError::TransactionClosed.into())
    }

    /// Confere que cada chave estrangeira aponta para uma linha existente do pai
    fn check_references(
        &self,
        table: &Table,
        schema: &TableSchema,
        working: &BTreeMap<TableName, Vec<DataRow>>,
    ) -> Result<()> {
        let Some(catalog) = &self.catalog else {
            return Ok(());
        };

        for fk in &schema.foreign_keys {
            let parent_id = catalog.schema(fk.parent)?.id_column;
            let parents: HashSet<&DataValue> = working
                .get(&fk.parent)
                .into_iter()
                .flatten()
                .filter_map(|row| row.get(parent_id))
                .collect();

            if let Some(orphan) = table
                .column_values(fk.column)
                .find(|value| !parents.contains(value))
            {
                return Err(LoadError::Database(format!(
                    "violação de chave estrangeira: {}.{} = {} não existe em {}",
                    table.name, fk.column, orphan, fk.parent
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn truncate(&mut self, table: TableName) -> Result<()> {
        // Em cascata: os filhos perdem as linhas que apontavam para a tabela
        let children = self
            .catalog
            .as_ref()
            .map(|catalog| catalog.descendants(table))
            .unwrap_or_default();

        let working = self.working()?;
        working.remove(&table);
        for child in children {
            working.remove(&child);
        }

        self.lock().journal.push(StoreOperation::Truncate(table));
        Ok(())
    }

    async fn insert(&mut self, table: &Table, schema: &TableSchema) -> Result<u64> {
        if self.lock().fail_on == Some(schema.name) {
            return Err(LoadError::Database(format!(
                "falha simulada ao inserir em {}",
                schema.name
            ))
            .into());
        }

        let working = self.working.take().ok_or(LoadError::TransactionClosed)?;
        let checked = self.check_references(table, schema, &working);
        self.working = Some(working);
        checked?;

        // Só as colunas do catálogo chegam ao destino
        let columns = schema.column_names();
        let rows: Vec<DataRow> = table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(DataValue::Null)))
                    .collect()
            })
            .collect();
        let inserted = rows.len();

        self.working()?.entry(schema.name).or_default().extend(rows);
        self.lock().journal.push(StoreOperation::Insert(schema.name, inserted));
        Ok(inserted as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        let working = self.working.take().ok_or(LoadError::TransactionClosed)?;
        let mut state = self.lock();
        state.tables = working;
        state.journal.push(StoreOperation::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.working.take().ok_or(LoadError::TransactionClosed)?;
        self.lock().journal.push(StoreOperation::Rollback);
        Ok(())
    }
}
