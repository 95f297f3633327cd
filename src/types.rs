use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use chrono::{NaiveDate, NaiveDateTime};
use crate::load::LoadReport;
use crate::schema::TableName;
use crate::transform::integrity::IntegrityReport;
use crate::transform::quality::QualityReport;

/// Representa uma linha de dados genérica
pub type DataRow = HashMap<String, DataValue>;

/// Valores de dados suportados
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Integer(i64),
    String(String),
    /// Data sem horário (YYYY-MM-DD)
    Date(NaiveDate),
    /// Data e horário sem timezone (YYYY-MM-DD HH:MM:SS)
    DateTime(NaiveDateTime),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => {
                0u8.hash(state);
            }
            DataValue::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            DataValue::String(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            DataValue::Date(date) => {
                3u8.hash(state);
                date.hash(state);
            }
            DataValue::DateTime(dt) => {
                4u8.hash(state);
                dt.hash(state);
            }
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (DataValue::Null, DataValue::Null) => Ordering::Equal,
            (DataValue::Null, _) => Ordering::Less,
            (_, DataValue::Null) => Ordering::Greater,

            (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
            (DataValue::Integer(_), _) => Ordering::Less,
            (_, DataValue::Integer(_)) => Ordering::Greater,

            (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
            (DataValue::String(_), _) => Ordering::Less,
            (_, DataValue::String(_)) => Ordering::Greater,

            (DataValue::Date(a), DataValue::Date(b)) => a.cmp(b),
            (DataValue::Date(_), DataValue::DateTime(_)) => Ordering::Less,
            (DataValue::DateTime(_), DataValue::Date(_)) => Ordering::Greater,

            (DataValue::DateTime(a), DataValue::DateTime(b)) => a.cmp(b),
        }
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(value: NaiveDate) -> Self {
        DataValue::Date(value)
    }
}

impl From<NaiveDateTime> for DataValue {
    fn from(value: NaiveDateTime) -> Self {
        DataValue::DateTime(value)
    }
}

static NULL: DataValue = DataValue::Null;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

impl DataValue {
    /// Converte para string se possível
    pub fn as_string(&self) -> Option<String> {
        match self {
            DataValue::String(s) => Some(s.clone()),
            DataValue::Integer(i) => Some(i.to_string()),
            DataValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            DataValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            DataValue::Null => None,
        }
    }

    /// Converte para inteiro se possível; texto decimal é truncado em direção a zero
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            DataValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    /// Converte para data (NaiveDate) se possível
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DataValue::Date(d) => Some(*d),
            DataValue::DateTime(dt) => Some(dt.date()),
            DataValue::String(s) => {
                let s = s.trim();
                DATE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                    .or_else(|| DataValue::String(s.to_string()).as_datetime().map(|dt| dt.date()))
            }
            _ => None,
        }
    }

    /// Converte para datetime (NaiveDateTime) se possível; uma data pura vira meia-noite
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            DataValue::DateTime(dt) => Some(*dt),
            DataValue::Date(d) => d.and_hms_opt(0, 0, 0),
            DataValue::String(s) => {
                let s = s.trim();
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .or_else(|| {
                        DATE_FORMATS
                            .iter()
                            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
            }
            _ => None,
        }
    }

    /// Verifica se é nulo
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_string() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "null"),
        }
    }
}

/// Uma tabela em memória: cabeçalho na ordem da fonte e linhas na ordem de leitura
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: TableName,
    pub columns: Vec<String>,
    pub rows: Vec<DataRow>,
}

impl Table {
    pub fn new(name: TableName, columns: Vec<String>) -> Self {
        Self {
            name,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<DataRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Valores de uma coluna, na ordem das linhas
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a DataValue> + 'a {
        self.rows.iter().map(move |row| row.get(column).unwrap_or(&NULL))
    }
}

/// Conjunto de tabelas de uma execução
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    tables: BTreeMap<TableName, Table>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name, table);
    }

    pub fn get(&self, name: TableName) -> Option<&Table> {
        self.tables.get(&name)
    }

    pub fn get_mut(&mut self, name: TableName) -> Option<&mut Table> {
        self.tables.get_mut(&name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Número de linhas por tabela
    pub fn row_counts(&self) -> BTreeMap<TableName, usize> {
        self.tables.iter().map(|(name, table)| (*name, table.len())).collect()
    }
}

/// Contagens por tabela ao longo dos estágios
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub extracted: usize,
    pub validated: usize,
    pub clamped: usize,
    pub duplicates_removed: usize,
    pub orphans_removed: usize,
    pub loaded: usize,
}

/// Resultado de uma execução completa do pipeline
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline_id: String,
    pub tables: BTreeMap<TableName, TableStats>,
    pub integrity: IntegrityReport,
    pub quality: QualityReport,
    pub load: LoadReport,
    pub execution_time_ms: u64,
}

impl RunReport {
    pub fn stats(&self, table: TableName) -> TableStats {
        self.tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn rows_extracted(&self) -> usize {
        self.tables.values().map(|s| s.extracted).sum()
    }

    pub fn rows_loaded(&self) -> usize {
        self.tables.values().map(|s| s.loaded).sum()
    }

    /// Linhas que a fonte tinha e o banco não recebeu (duplicatas + órfãs)
    pub fn rows_removed(&self) -> usize {
        self.tables
            .values()
            .map(|s| s.duplicates_removed + s.orphans_removed)
            .sum()
    }
}

/// Estados do pipeline para rastreamento de execução
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Validating,
    Deduplicating,
    Repairing,
    Loading,
    Completed,
    Failed(String),
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Ocioso"),
            PipelineState::Extracting => write!(f, "Extraindo"),
            PipelineState::Validating => write!(f, "Validando"),
            PipelineState::Deduplicating => write!(f, "Deduplicando"),
            PipelineState::Repairing => write!(f, "Reparando referências"),
            PipelineState::Loading => write!(f, "Carregando"),
            PipelineState::Completed => write!(f, "Concluído"),
            PipelineState::Failed(error) => write!(f, "Falhou: {}", error),
        }
    }
}

/// Eventos do pipeline para monitoramento externo
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Pipeline iniciado
    Started {
        pipeline_id: String,
        timestamp: std::time::SystemTime,
    },
    /// Estado alterado
    StateChanged {
        pipeline_id: String,
        old_state: PipelineState,
        new_state: PipelineState,
        timestamp: std::time::SystemTime,
    },
    /// Uma tabela passou por um estágio
    TableProcessed {
        pipeline_id: String,
        table: TableName,
        stage: PipelineState,
        rows_in: usize,
        rows_out: usize,
        timestamp: std::time::SystemTime,
    },
    /// Erro ocorreu
    Error {
        pipeline_id: String,
        error: String,
        timestamp: std::time::SystemTime,
    },
    /// Pipeline concluído
    Completed {
        pipeline_id: String,
        rows_extracted: usize,
        rows_loaded: usize,
        execution_time_ms: u64,
        timestamp: std::time::SystemTime,
    },
}
