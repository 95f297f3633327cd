//! Carga com substituição completa em uma única transação

pub mod memory;

#[cfg(feature = "database")]
pub mod postgres;

pub use memory::{MemoryStore, StoreOperation};

#[cfg(feature = "database")]
pub use postgres::PgStore;

use serde::Serialize;
use tracing::{error, info, warn};
use crate::error::Result;
use crate::schema::{Catalog, TableName};
use crate::traits::{Store, StoreTransaction};
use crate::types::{Dataset, Table};

/// Tipo de etapa da carga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOperation {
    Truncate,
    Insert,
}

/// Resultado de uma etapa
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    /// Não executada porque uma etapa anterior falhou
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStep {
    pub operation: LoadOperation,
    pub table: TableName,
    pub outcome: StepOutcome,
    pub rows: u64,
}

/// Relatório da carga: todas as etapas planejadas, na ordem de execução
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub steps: Vec<LoadStep>,
    pub committed: bool,
    /// Falha ao confirmar ou desfazer a transação
    pub transaction_error: Option<String>,
}

impl LoadReport {
    /// Todas as etapas concluídas e a transação confirmada
    pub fn success(&self) -> bool {
        self.committed && self.steps.iter().all(|s| s.outcome == StepOutcome::Succeeded)
    }

    /// Primeira etapa que falhou
    pub fn first_failure(&self) -> Option<&LoadStep> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    /// Linhas efetivamente persistidas na tabela (zero se nada foi confirmado)
    pub fn rows_loaded(&self, table: TableName) -> u64 {
        if !self.committed {
            return 0;
        }
        self.steps
            .iter()
            .filter(|s| s.operation == LoadOperation::Insert && s.table == table)
            .map(|s| s.rows)
            .sum()
    }
}

/// Substitui o conteúdo persistido pelas tabelas do conjunto de dados.
///
/// Esvazia as tabelas de filhos para pais e insere de pais para filhos,
/// tudo na mesma transação. Na primeira falha a transação é desfeita e o
/// estado anterior do banco permanece intacto.
#[derive(Debug, Clone)]
pub struct Loader {
    catalog: Catalog,
}

impl Loader {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Etapas na ordem em que serão executadas
    pub fn plan(&self) -> Vec<(LoadOperation, TableName)> {
        self.catalog
            .drop_order()
            .into_iter()
            .map(|t| (LoadOperation::Truncate, t))
            .chain(
                self.catalog
                    .load_order()
                    .iter()
                    .map(|t| (LoadOperation::Insert, *t)),
            )
            .collect()
    }

    pub async fn load(&self, store: &dyn Store, dataset: &Dataset) -> Result<LoadReport> {
        let plan = self.plan();
        let mut tx = store.begin().await?;
        let mut report = LoadReport::default();

        for (index, (operation, table)) in plan.iter().copied().enumerate() {
            match self.run_step(tx.as_mut(), operation, table, dataset).await {
                Ok(rows) => {
                    info!(table = %table, operation = ?operation, rows = rows, "Etapa de carga concluída");
                    report.steps.push(LoadStep {
                        operation,
                        table,
                        outcome: StepOutcome::Succeeded,
                        rows,
                    });
                }
                Err(e) => {
                    error!(table = %table, operation = ?operation, error = %e, "Etapa de carga falhou");
                    report.steps.push(LoadStep {
                        operation,
                        table,
                        outcome: StepOutcome::Failed(e.to_string()),
                        rows: 0,
                    });
                    report.steps.extend(plan[index + 1..].iter().map(|(operation, table)| LoadStep {
                        operation: *operation,
                        table: *table,
                        outcome: StepOutcome::Skipped,
                        rows: 0,
                    }));

                    if let Err(rollback_error) = tx.rollback().await {
                        warn!(error = %rollback_error, "Falha ao desfazer a transação");
                        report.transaction_error = Some(rollback_error.to_string());
                    }
                    return Ok(report);
                }
            }
        }

        match tx.commit().await {
            Ok(()) => report.committed = true,
            Err(e) => {
                error!(error = %e, "Falha ao confirmar a transação");
                report.transaction_error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    async fn run_step(
        &self,
        tx: &mut dyn StoreTransaction,
        operation: LoadOperation,
        table: TableName,
        dataset: &Dataset,
    ) -> Result<u64> {
        match operation {
            LoadOperation::Truncate => {
                tx.truncate(table).await?;
                Ok(0)
            }
            LoadOperation::Insert => {
                let schema = self.catalog.schema(table)?;
                let empty;
                let rows = match dataset.get(table) {
                    Some(rows) => rows,
                    None => {
                        empty = Table::new(table, Vec::new());
                        &empty
                    }
                };
                tx.insert(rows, schema).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataRow, DataValue};

    fn dataset() -> Dataset {
        let row = |pairs: &[(&str, DataValue)]| -> DataRow {
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
        };
        let mut dataset = Dataset::new();
        dataset.insert(Table::new(TableName::Students, Vec::new()).with_rows(vec![
            row(&[("student_id", DataValue::Integer(1))]),
            row(&[("student_id", DataValue::Integer(2))]),
        ]));
        dataset.insert(
            Table::new(TableName::Courses, Vec::new())
                .with_rows(vec![row(&[("course_id", DataValue::Integer(10))])]),
        );
        dataset.insert(Table::new(TableName::Enrollments, Vec::new()).with_rows(vec![row(&[
            ("enrollment_id", DataValue::Integer(100)),
            ("student_id", DataValue::Integer(1)),
            ("course_id", DataValue::Integer(10)),
        ])]));
        dataset.insert(Table::new(TableName::Grades, Vec::new()).with_rows(vec![row(&[
            ("grades_id", DataValue::Integer(1)),
            ("enrollment_id", DataValue::Integer(100)),
        ])]));
        dataset
    }

    #[tokio::test]
    async fn test_truncates_children_first_and_inserts_parents_first() {
        let store = MemoryStore::new();
        let loader = Loader::new(Catalog::academic());

        let report = loader.load(&store, &dataset()).await.unwrap();
        assert!(report.success());

        let expected = vec![
            StoreOperation::Begin,
            StoreOperation::Truncate(TableName::Attendance),
            StoreOperation::Truncate(TableName::Grades),
            StoreOperation::Truncate(TableName::Enrollments),
            StoreOperation::Truncate(TableName::Courses),
            StoreOperation::Truncate(TableName::Students),
            StoreOperation::Insert(TableName::Students, 2),
            StoreOperation::Insert(TableName::Courses, 1),
            StoreOperation::Insert(TableName::Enrollments, 1),
            StoreOperation::Insert(TableName::Grades, 1),
            // tabela ausente do conjunto é carregada vazia
            StoreOperation::Insert(TableName::Attendance, 0),
            StoreOperation::Commit,
        ];
        assert_eq!(store.journal(), expected);
        assert_eq!(report.rows_loaded(TableName::Students), 2);
        assert_eq!(store.row_count(TableName::Grades), 1);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_skips_remaining_steps() {
        let store = MemoryStore::new();
        let loader = Loader::new(Catalog::academic());
        loader.load(&store, &dataset()).await.unwrap();

        store.fail_on(TableName::Grades);
        let mut next = dataset();
        if let Some(students) = next.get_mut(TableName::Students) {
            students.rows.truncate(1);
        }
        let report = loader.load(&store, &next).await.unwrap();

        assert!(!report.success());
        assert!(!report.committed);
        let failed = report.first_failure().unwrap();
        assert_eq!(failed.table, TableName::Grades);
        assert_eq!(failed.operation, LoadOperation::Insert);
        let last = report.steps.last().unwrap();
        assert_eq!(last.table, TableName::Attendance);
        assert_eq!(last.outcome, StepOutcome::Skipped);
        assert_eq!(report.steps.len(), 10);
        assert_eq!(report.rows_loaded(TableName::Students), 0);

        // O estado anterior continua persistido
        assert_eq!(store.row_count(TableName::Students), 2);
        assert_eq!(store.row_count(TableName::Grades), 1);
        assert_eq!(store.journal().last(), Some(&StoreOperation::Rollback));
    }
}
