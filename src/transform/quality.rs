//! Auditoria de qualidade não fatal
//!
//! As verificações daqui nunca abortam a execução nem removem linhas: apenas
//! contam e registram valores suspeitos.

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::warn;
use crate::schema::TableName;
use crate::types::{DataValue, Dataset, Table};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("regex de e-mail inválida")
});

static STUDENT_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\d{2}$").expect("regex de matrícula inválida"));

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L} -]+$").expect("regex de nome inválida"));

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 50;
pub const MIN_ENTRY_YEAR: i32 = 1950;
pub const MIN_AGE: i32 = 18;
pub const MAX_AGE: i32 = 100;
pub const MIN_ACADEMIC_YEAR: i32 = 2000;
/// Anos à frente do atual aceitos como início de ano letivo
pub const ACADEMIC_YEAR_HORIZON: i32 = 5;

const MAX_SAMPLES: usize = 5;

/// Valores suspeitos encontrados por uma verificação
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityFinding {
    pub table: TableName,
    pub check: &'static str,
    pub count: usize,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub findings: Vec<QualityFinding>,
}

impl QualityReport {
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn total(&self) -> usize {
        self.findings.iter().map(|f| f.count).sum()
    }

    pub fn count_for(&self, table: TableName, check: &str) -> usize {
        self.findings
            .iter()
            .filter(|f| f.table == table && f.check == check)
            .map(|f| f.count)
            .sum()
    }

    fn record(&mut self, table: TableName, check: &'static str, offenders: Vec<String>) {
        if offenders.is_empty() {
            return;
        }
        let samples: Vec<String> = offenders
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(MAX_SAMPLES)
            .collect();
        warn!(
            table = %table,
            check = check,
            count = offenders.len(),
            samples = ?samples,
            "Valores suspeitos"
        );
        self.findings.push(QualityFinding {
            table,
            check,
            count: offenders.len(),
            samples,
        });
    }
}

/// Audita o conjunto de dados usando a data local de hoje
pub fn audit(dataset: &Dataset) -> QualityReport {
    audit_at(dataset, Local::now().date_naive())
}

/// Audita o conjunto de dados tomando `today` como referência
pub fn audit_at(dataset: &Dataset, today: NaiveDate) -> QualityReport {
    let mut report = QualityReport::default();

    if let Some(students) = dataset.get(TableName::Students) {
        report.record(
            TableName::Students,
            "student_number",
            offenders(students, "student_number", |v| valid_student_number(v, today.year())),
        );
        for column in ["first_name", "last_name"] {
            report.record(TableName::Students, column, offenders(students, column, valid_name));
        }
        report.record(
            TableName::Students,
            "email",
            offenders(students, "email", |v| {
                v.as_string().is_some_and(|email| EMAIL_REGEX.is_match(email.trim()))
            }),
        );
        report.record(
            TableName::Students,
            "date_of_birth",
            offenders(students, "date_of_birth", |v| {
                v.as_date()
                    .map(|dob| (MIN_AGE..=MAX_AGE).contains(&age_on(dob, today)))
                    .unwrap_or(false)
            }),
        );
    }

    if let Some(enrollments) = dataset.get(TableName::Enrollments) {
        let latest = today.year() + ACADEMIC_YEAR_HORIZON;
        report.record(
            TableName::Enrollments,
            "academic_year",
            offenders(enrollments, "academic_year", |v| {
                v.as_string()
                    .and_then(|s| s.split('-').next().and_then(|y| y.trim().parse::<i32>().ok()))
                    .is_some_and(|start| (MIN_ACADEMIC_YEAR..=latest).contains(&start))
            }),
        );
    }

    report
}

/// Valores não nulos da coluna que não passam em `is_valid`
fn offenders(table: &Table, column: &str, is_valid: impl Fn(&DataValue) -> bool) -> Vec<String> {
    table
        .column_values(column)
        .filter(|v| !v.is_null() && !is_valid(*v))
        .map(|v| v.to_string())
        .collect()
}

/// Entre 2 e 50 caracteres, só letras, espaços e hífens
fn valid_name(value: &DataValue) -> bool {
    value.as_string().is_some_and(|name| {
        let name = name.trim();
        (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.chars().count()) && NAME_REGEX.is_match(name)
    })
}

/// Matrícula no formato AAAARR, com AAAA entre 1950 e o ano corrente
fn valid_student_number(value: &DataValue, current_year: i32) -> bool {
    let Some(text) = value.as_string() else {
        return false;
    };
    STUDENT_NUMBER_REGEX
        .captures(text.trim())
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .is_some_and(|year| (MIN_ENTRY_YEAR..=current_year).contains(&year))
}

fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataRow;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn student(number: i64, email: &str, dob: NaiveDate) -> DataRow {
        let mut row = DataRow::new();
        row.insert("student_number".to_string(), DataValue::Integer(number));
        row.insert("email".to_string(), DataValue::from(email));
        row.insert("date_of_birth".to_string(), DataValue::Date(dob));
        row
    }

    #[test]
    fn test_student_checks() {
        let adult = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let minor = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let mut dataset = Dataset::new();
        dataset.insert(Table::new(TableName::Students, Vec::new()).with_rows(vec![
            student(202401, "ana@uni.edu", adult),
            student(194901, "bruno@uni.edu", adult),
            student(20241, "carla(at)uni.edu", minor),
        ]));

        let report = audit_at(&dataset, today());

        assert_eq!(report.count_for(TableName::Students, "student_number"), 2);
        assert_eq!(report.count_for(TableName::Students, "email"), 1);
        assert_eq!(report.count_for(TableName::Students, "date_of_birth"), 1);
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn test_name_checks() {
        let names = [
            ("Ana", "Souza"),
            ("Nan", "Na"),
            ("Maria José", "Oliveira-Lima"),
            ("A", "Silva"),
            ("J0hn", "O'Brien"),
        ];
        let rows = names
            .iter()
            .map(|(first, last)| {
                let mut row = DataRow::new();
                row.insert("first_name".to_string(), DataValue::from(*first));
                row.insert("last_name".to_string(), DataValue::from(*last));
                row
            })
            .collect();
        let mut dataset = Dataset::new();
        dataset.insert(Table::new(TableName::Students, Vec::new()).with_rows(rows));

        let report = audit_at(&dataset, today());

        assert_eq!(report.count_for(TableName::Students, "first_name"), 2);
        assert_eq!(report.count_for(TableName::Students, "last_name"), 1);
        assert!(valid_name(&DataValue::from("x".repeat(50).as_str())));
        assert!(!valid_name(&DataValue::from("x".repeat(51).as_str())));
    }

    #[test]
    fn test_null_values_are_not_findings() {
        let mut row = DataRow::new();
        row.insert("student_number".to_string(), DataValue::Integer(202301));
        row.insert("email".to_string(), DataValue::Null);
        let mut dataset = Dataset::new();
        dataset.insert(Table::new(TableName::Students, Vec::new()).with_rows(vec![row]));

        assert!(audit_at(&dataset, today()).is_empty());
    }

    #[test]
    fn test_academic_year_window() {
        let mut dataset = Dataset::new();
        let rows = ["2024-2025", "1999-2000", "2031-2032", "2030-2031"]
            .iter()
            .map(|year| {
                let mut row = DataRow::new();
                row.insert("academic_year".to_string(), DataValue::from(*year));
                row
            })
            .collect();
        dataset.insert(Table::new(TableName::Enrollments, Vec::new()).with_rows(rows));

        let report = audit_at(&dataset, today());
        assert_eq!(report.count_for(TableName::Enrollments, "academic_year"), 2);
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = NaiveDate::from_ymd_opt(2007, 6, 16).unwrap();
        assert_eq!(age_on(dob, today()), 17);
        let dob = NaiveDate::from_ymd_opt(2007, 6, 15).unwrap();
        assert_eq!(age_on(dob, today()), 18);
    }
}
