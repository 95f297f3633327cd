//! Reparo da integridade referencial com remoção em cascata

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use crate::error::Result;
use crate::schema::{Catalog, TableName};
use crate::types::{DataValue, Dataset};

/// Linhas removidas por uma chave estrangeira sem correspondência
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRemoval {
    pub table: TableName,
    pub column: String,
    pub parent: TableName,
    pub removed: usize,
}

/// Resultado do reparo referencial
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Uma entrada por chave estrangeira verificada, na ordem de carga
    pub removals: Vec<OrphanRemoval>,
}

impl IntegrityReport {
    /// `true` quando nenhuma linha precisou ser removida
    pub fn is_clean(&self) -> bool {
        self.total_removed() == 0
    }

    pub fn total_removed(&self) -> usize {
        self.removals.iter().map(|r| r.removed).sum()
    }

    pub fn removed_for(&self, table: TableName) -> usize {
        self.removals
            .iter()
            .filter(|r| r.table == table)
            .map(|r| r.removed)
            .sum()
    }

    /// Resumo legível das remoções não nulas
    pub fn summary(&self) -> String {
        self.removals
            .iter()
            .filter(|r| r.removed > 0)
            .map(|r| format!("{}.{} -> {}: {}", r.table, r.column, r.parent, r.removed))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Remove as linhas cuja chave estrangeira não resolve para uma linha do pai.
///
/// As tabelas são visitadas na ordem de carga, então cada filho é filtrado
/// contra o conjunto já reparado do pai e a remoção se propaga em cascata.
pub fn repair(dataset: &mut Dataset, catalog: &Catalog) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();

    for &name in catalog.load_order() {
        let schema = catalog.schema(name)?;

        for fk in &schema.foreign_keys {
            let parent_schema = catalog.schema(fk.parent)?;
            let valid: HashSet<DataValue> = dataset
                .get(fk.parent)
                .map(|parent| parent.column_values(parent_schema.id_column).cloned().collect())
                .unwrap_or_default();

            let Some(table) = dataset.get_mut(name) else {
                continue;
            };

            let before = table.rows.len();
            table.rows.retain(|row| {
                row.get(fk.column)
                    .map(|value| !value.is_null() && valid.contains(value))
                    .unwrap_or(false)
            });
            let removed = before - table.rows.len();

            if removed > 0 {
                warn!(
                    table = %name,
                    column = fk.column,
                    parent = %fk.parent,
                    removed = removed,
                    "Linhas órfãs removidas"
                );
            } else {
                debug!(table = %name, column = fk.column, "Referências válidas");
            }

            report.removals.push(OrphanRemoval {
                table: name,
                column: fk.column.to_string(),
                parent: fk.parent,
                removed,
            });
        }
    }

    Ok(report)
}
