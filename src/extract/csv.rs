use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{ETLError, ExtractError, Result};
use crate::schema::{TableName, TableSchema};
use crate::traits::Extractor;
use crate::types::{DataRow, Table};
use super::raw_value;

/// Extrator que lê `<diretório>/<tabela>.csv`
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    data_dir: PathBuf,
    delimiter: u8,
    quote_char: u8,
}

impl CsvExtractor {
    /// Cria um novo extrator CSV sobre um diretório
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            delimiter: b',',
            quote_char: b'"',
        }
    }

    /// Define o delimitador
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Define o caractere de aspas
    pub fn with_quote_char(mut self, quote_char: u8) -> Self {
        self.quote_char = quote_char;
        self
    }

    /// Caminho do arquivo de uma tabela
    pub fn path_for(&self, table: TableName) -> PathBuf {
        self.data_dir.join(format!("{}.csv", table.as_str()))
    }

    /// Cabeçalho e linhas de um conteúdo CSV
    fn parse(&self, content: &[u8]) -> Result<(Vec<String>, Vec<DataRow>)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote_char)
            .has_headers(true)
            .from_reader(content);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: DataRow = headers
                .iter()
                .zip(record.iter())
                .map(|(header, field)| (header.clone(), raw_value(field)))
                .collect();
            rows.push(row);
        }

        Ok((headers, rows))
    }
}

#[async_trait]
impl Extractor for CsvExtractor {
    async fn extract(&self, schema: &TableSchema) -> Result<Table> {
        let path = self.path_for(schema.name);

        let content = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ETLError::Extract(ExtractError::SourceMissing {
                    table: schema.name,
                    path: path.display().to_string(),
                })
            } else {
                ETLError::Extract(ExtractError::Unreadable {
                    table: schema.name,
                    reason: e.to_string(),
                })
            }
        })?;

        let (columns, rows) = self.parse(&content).map_err(|e| {
            ETLError::Extract(ExtractError::Unreadable {
                table: schema.name,
                reason: e.to_string(),
            })
        })?;

        debug!(table = %schema.name, path = %path.display(), rows = rows.len(), "CSV lido");

        Ok(Table::new(schema.name, columns).with_rows(rows))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.data_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Catalog;
    use crate::types::DataValue;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_csv_extractor_reads_raw_values() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("courses.csv"),
            "course_id,course_code,course_name,credits,status\n\
             1,CS101,Intro,4,Active\n\
             2,MA201,\"Calculus, II\",,NULL\n",
        )
        .unwrap();

        let catalog = Catalog::academic();
        let extractor = CsvExtractor::new(dir.path());
        let table = extractor
            .extract(catalog.schema(TableName::Courses).unwrap())
            .await
            .unwrap();

        assert_eq!(table.name, TableName::Courses);
        assert_eq!(table.columns.len(), 5);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0]["course_id"], DataValue::from("1"));
        assert_eq!(table.rows[0]["status"], DataValue::from("Active"));
        assert_eq!(table.rows[1]["course_name"], DataValue::from("Calculus, II"));
        assert_eq!(table.rows[1]["credits"], DataValue::Null);
        assert_eq!(table.rows[1]["status"], DataValue::Null);
    }

    #[tokio::test]
    async fn test_csv_extractor_custom_delimiter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("students.csv"), "student_id;status\n7;active\n").unwrap();

        let catalog = Catalog::academic();
        let extractor = CsvExtractor::new(dir.path()).with_delimiter(b';');
        let table = extractor
            .extract(catalog.schema(TableName::Students).unwrap())
            .await
            .unwrap();

        assert_eq!(table.columns, vec!["student_id", "status"]);
        assert_eq!(table.rows[0]["student_id"], DataValue::from("7"));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_missing() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::academic();
        let extractor = CsvExtractor::new(dir.path());

        let err = extractor
            .extract(catalog.schema(TableName::Grades).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ETLError::Extract(ExtractError::SourceMissing { table: TableName::Grades, .. })
        ));
        assert_eq!(err.error_code(), "SOURCE_MISSING");
    }

    #[tokio::test]
    async fn test_ragged_rows_are_unreadable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("attendance.csv"), "a,b\n1,2,3\n").unwrap();

        let catalog = Catalog::academic();
        let extractor = CsvExtractor::new(dir.path());
        let err = extractor
            .extract(catalog.schema(TableName::Attendance).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ETLError::Extract(ExtractError::Unreadable { .. })));
    }
}
