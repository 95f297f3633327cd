use async_trait::async_trait;
use std::collections::HashMap;
use crate::error::{ExtractError, Result};
use crate::extract::raw_value;
use crate::schema::{TableName, TableSchema};
use crate::traits::Extractor;
use crate::types::{DataRow, Table};

/// Extrator que serve tabelas já montadas em memória
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    tables: HashMap<TableName, Table>,
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona uma tabela pronta
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.insert(table.name, table);
        self
    }

    /// Adiciona uma tabela a partir de texto, como viria de um CSV
    pub fn with_records(mut self, name: TableName, columns: &[&str], records: &[&[&str]]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .zip(record.iter())
                    .map(|(column, field)| (column.clone(), raw_value(field)))
                    .collect::<DataRow>()
            })
            .collect();
        self.tables.insert(name, Table::new(name, columns).with_rows(rows));
        self
    }

    /// Remove uma tabela
    pub fn without_table(mut self, name: TableName) -> Self {
        self.tables.remove(&name);
        self
    }
}

#[async_trait]
impl Extractor for MemoryExtractor {
    async fn extract(&self, schema: &TableSchema) -> Result<Table> {
        self.tables.get(&schema.name).cloned().ok_or_else(|| {
            ExtractError::SourceMissing {
                table: schema.name,
                path: format!("memory:{}", schema.name),
            }
            .into()
        })
    }

    fn describe(&self) -> String {
        format!("memory:{} tabelas", self.tables.len())
    }
}
