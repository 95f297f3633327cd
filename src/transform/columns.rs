//! Validação de colunas e nulos, e conversão de tipos

use crate::error::{Result, ValidationError};
use crate::schema::{ColumnType, TableSchema};
use crate::types::{DataValue, Table};

/// Exige que todas as colunas do catálogo estejam no cabeçalho.
/// Colunas extras são mantidas.
pub fn validate_columns(table: &Table, schema: &TableSchema) -> Result<()> {
    let missing: Vec<String> = schema
        .column_names()
        .into_iter()
        .filter(|column| !table.has_column(column))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns {
            table: schema.name,
            columns: missing,
        }
        .into())
    }
}

/// Exige que nenhuma coluna obrigatória tenha valor ausente
pub fn validate_required(table: &Table, schema: &TableSchema) -> Result<()> {
    let with_nulls: Vec<String> = schema
        .required_columns()
        .into_iter()
        .filter(|column| table.column_values(column).any(DataValue::is_null))
        .map(str::to_string)
        .collect();

    if with_nulls.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::NullValues {
            table: schema.name,
            columns: with_nulls,
        }
        .into())
    }
}

/// Converte cada coluna do catálogo para o seu tipo.
///
/// Nulos continuam nulos. Um valor que não converte aborta com
/// `InvalidValue`, indicando a linha (a partir de 1, sem o cabeçalho).
pub fn coerce_types(table: &mut Table, schema: &TableSchema) -> Result<()> {
    for (index, row) in table.rows.iter_mut().enumerate() {
        for column in &schema.columns {
            let Some(value) = row.get_mut(column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let coerced = match column.column_type {
                ColumnType::Text => value.as_string().map(|s| DataValue::String(s.trim().to_string())),
                ColumnType::Integer => value.as_integer().map(DataValue::Integer),
                ColumnType::Date => value.as_date().map(DataValue::Date),
                ColumnType::Timestamp => value.as_datetime().map(DataValue::DateTime),
            };

            match coerced {
                Some(coerced) => *value = coerced,
                None => {
                    return Err(ValidationError::InvalidValue {
                        table: schema.name,
                        column: column.name.to_string(),
                        row: index + 1,
                        value: value.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    Ok(())
}
