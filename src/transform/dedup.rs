use std::collections::HashSet;
use crate::types::{DataValue, Table};

/// Mantém a primeira linha de cada chave natural, preservando a ordem das
/// sobreviventes, e retorna quantas linhas foram removidas.
///
/// Uma chave vazia significa que a tabela não é deduplicada.
pub fn deduplicate(table: &mut Table, key: &[&str]) -> usize {
    if key.is_empty() {
        return 0;
    }

    let before = table.rows.len();
    let mut seen: HashSet<Vec<DataValue>> = HashSet::with_capacity(before);

    table.rows.retain(|row| {
        let tuple = key
            .iter()
            .map(|column| row.get(*column).cloned().unwrap_or(DataValue::Null))
            .collect();
        seen.insert(tuple)
    });

    before - table.rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableName;
    use crate::types::DataRow;

    fn student(id: i64, number: i64) -> DataRow {
        let mut row = DataRow::new();
        row.insert("student_id".to_string(), DataValue::Integer(id));
        row.insert("student_number".to_string(), DataValue::Integer(number));
        row
    }

    #[test]
    fn test_keeps_first_row_per_key() {
        let mut students = Table::new(
            TableName::Students,
            vec!["student_id".to_string(), "student_number".to_string()],
        )
        .with_rows(vec![
            student(1, 202401),
            student(2, 202402),
            student(3, 202401),
            student(4, 202403),
            student(5, 202402),
        ]);

        let removed = deduplicate(&mut students, &["student_number"]);

        assert_eq!(removed, 2);
        let ids: Vec<_> = students.column_values("student_id").cloned().collect();
        assert_eq!(
            ids,
            vec![DataValue::Integer(1), DataValue::Integer(2), DataValue::Integer(4)]
        );
    }

    #[test]
    fn test_composite_key_and_empty_key() {
        let row = |s: i64, c: i64, year: &str, term: &str| -> DataRow {
            [
                ("student_id", DataValue::Integer(s)),
                ("course_id", DataValue::Integer(c)),
                ("academic_year", DataValue::from(year)),
                ("term", DataValue::from(term)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
        };
        let rows = vec![
            row(1, 1, "2024-2025", "1"),
            row(1, 1, "2024-2025", "2"),
            row(1, 1, "2024-2025", "1"),
        ];
        let key = ["student_id", "course_id", "academic_year", "term"];

        let mut enrollments = Table::new(TableName::Enrollments, Vec::new()).with_rows(rows.clone());
        assert_eq!(deduplicate(&mut enrollments, &key), 1);
        assert_eq!(enrollments.len(), 2);

        let mut grades = Table::new(TableName::Grades, Vec::new()).with_rows(rows);
        assert_eq!(deduplicate(&mut grades, &[]), 0);
        assert_eq!(grades.len(), 3);
    }
}
