//! Validação de domínio e normalização de formatos

use std::collections::BTreeSet;
use tracing::warn;
use crate::config::GradePolicy;
use crate::error::{Result, ValidationError};
use crate::schema::{DomainRule, TableSchema};
use crate::types::{DataValue, Table};

/// Quantidade máxima de valores inválidos citados numa falha
pub const MAX_SAMPLES: usize = 10;

/// Efeitos colaterais não fatais da validação de domínio
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainOutcome {
    /// Valores trazidos para dentro do intervalo permitido
    pub clamped: usize,
}

/// Normaliza um ano letivo para `"A-(A+1)"`.
///
/// Aceita um ano isolado (`"2024"`) ou um intervalo cujo primeiro ano tem
/// quatro dígitos (`"2024-2099"`); o ano final informado é descartado.
pub fn normalize_academic_year(raw: &str) -> Option<String> {
    let start = raw.trim().split('-').next()?.trim();
    if start.len() != 4 || !start.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = start.parse().ok()?;
    Some(format!("{}-{}", year, year + 1))
}

/// Aplica as regras de domínio da tabela, normalizando valores no lugar.
///
/// Qualquer valor que continue fora do domínio depois da normalização
/// aborta com `ValidationError::Domain`.
pub fn apply_domain_rules(
    table: &mut Table,
    schema: &TableSchema,
    grade_policy: GradePolicy,
) -> Result<DomainOutcome> {
    let mut outcome = DomainOutcome::default();

    for rule in &schema.rules {
        let column = rule.column();
        let mut offenders = BTreeSet::new();

        for row in table.rows.iter_mut() {
            let Some(value) = row.get_mut(column) else {
                continue;
            };

            match rule {
                DomainRule::Categorical { allowed, lowercase, .. } => {
                    let Some(text) = value.as_string() else {
                        continue;
                    };
                    let text = text.trim();
                    let text = if *lowercase { text.to_lowercase() } else { text.to_string() };

                    if !allowed.iter().any(|candidate| *candidate == text) {
                        offenders.insert(text.clone());
                    }
                    *value = DataValue::String(text);
                }
                DomainRule::AcademicYear { .. } => {
                    match value.as_string().as_deref().and_then(normalize_academic_year) {
                        Some(normalized) => *value = DataValue::String(normalized),
                        None => {
                            offenders.insert(value.to_string());
                        }
                    }
                }
                DomainRule::Range { min, max, .. } => {
                    let Some(number) = value.as_integer() else {
                        continue;
                    };
                    if (*min..=*max).contains(&number) {
                        *value = DataValue::Integer(number);
                        continue;
                    }
                    match grade_policy {
                        GradePolicy::Clamp => {
                            *value = DataValue::Integer(number.clamp(*min, *max));
                            outcome.clamped += 1;
                        }
                        GradePolicy::Reject => {
                            offenders.insert(number.to_string());
                        }
                    }
                }
            }
        }

        // A coluna de ano letivo também pode faltar na linha
        if matches!(rule, DomainRule::AcademicYear { .. }) {
            let absent = table.rows.iter().filter(|row| !row.contains_key(column)).count();
            if absent > 0 {
                offenders.insert(DataValue::Null.to_string());
            }
        }

        if !offenders.is_empty() {
            return Err(ValidationError::Domain {
                table: schema.name,
                column: column.to_string(),
                reason: describe(rule),
                samples: offenders.into_iter().take(MAX_SAMPLES).collect(),
            }
            .into());
        }
    }

    if outcome.clamped > 0 {
        warn!(
            table = %schema.name,
            clamped = outcome.clamped,
            "Valores fora do intervalo ajustados aos limites"
        );
    }

    Ok(outcome)
}

fn describe(rule: &DomainRule) -> String {
    match rule {
        DomainRule::Categorical { allowed, .. } => {
            format!("valores permitidos: {}", allowed.join(", "))
        }
        DomainRule::AcademicYear { .. } => "ano letivo deve ser YYYY ou YYYY-YYYY".to_string(),
        DomainRule::Range { min, max, .. } => format!("valor deve estar entre {} e {}", min, max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ETLError;
    use crate::schema::{Catalog, TableName};
    use crate::types::DataRow;

    fn table(name: TableName, column: &str, values: &[DataValue]) -> Table {
        let rows = values
            .iter()
            .map(|v| {
                let mut row = DataRow::new();
                row.insert(column.to_string(), v.clone());
                row
            })
            .collect();
        Table::new(name, vec![column.to_string()]).with_rows(rows)
    }

    #[test]
    fn test_normalize_academic_year() {
        assert_eq!(normalize_academic_year("2024").as_deref(), Some("2024-2025"));
        assert_eq!(normalize_academic_year("2024-2099").as_deref(), Some("2024-2025"));
        assert_eq!(normalize_academic_year(" 2023-2024 ").as_deref(), Some("2023-2024"));
        assert_eq!(normalize_academic_year("24"), None);
        assert_eq!(normalize_academic_year("abcd-2025"), None);
        assert_eq!(normalize_academic_year(""), None);
    }

    #[test]
    fn test_status_is_lowercased_before_check() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Students).unwrap();
        let mut students = table(
            TableName::Students,
            "status",
            &["Active".into(), "GRADUATED".into(), " inactive ".into()],
        );

        apply_domain_rules(&mut students, schema, GradePolicy::Clamp).unwrap();

        let statuses: Vec<_> = students.column_values("status").cloned().collect();
        assert_eq!(
            statuses,
            vec![
                DataValue::from("active"),
                DataValue::from("graduated"),
                DataValue::from("inactive"),
            ]
        );
    }

    #[test]
    fn test_unknown_category_is_domain_failure_with_samples() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Attendance).unwrap();
        let mut attendance = table(
            TableName::Attendance,
            "status",
            &["present".into(), "Excused".into(), "excused".into(), "sick".into()],
        );

        let err = apply_domain_rules(&mut attendance, schema, GradePolicy::Clamp).unwrap_err();
        assert_eq!(err.error_code(), "DOMAIN_VALIDATION_FAILURE");
        match err {
            ETLError::Validation(ValidationError::Domain { column, samples, .. }) => {
                assert_eq!(column, "status");
                assert_eq!(samples, vec!["excused".to_string(), "sick".to_string()]);
            }
            other => panic!("erro inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_term_is_not_case_folded() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Enrollments).unwrap();
        let mut enrollments = table(TableName::Enrollments, "term", &["1".into(), "3".into()]);

        // sem a coluna academic_year a regra de ano letivo também falharia; a de termo vem antes
        let err = apply_domain_rules(&mut enrollments, schema, GradePolicy::Clamp).unwrap_err();
        match err {
            ETLError::Validation(ValidationError::Domain { column, samples, .. }) => {
                assert_eq!(column, "term");
                assert_eq!(samples, vec!["3".to_string()]);
            }
            other => panic!("erro inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_null_academic_year_is_domain_failure() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Enrollments).unwrap();
        let mut enrollments = Table::new(
            TableName::Enrollments,
            vec!["term".to_string(), "academic_year".to_string()],
        )
        .with_rows(vec![
            [("term", DataValue::from("1")), ("academic_year", DataValue::from("2024"))]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            [("term", DataValue::from("2")), ("academic_year", DataValue::Null)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ]);

        let err = apply_domain_rules(&mut enrollments, schema, GradePolicy::Clamp).unwrap_err();
        match err {
            ETLError::Validation(ValidationError::Domain { column, samples, .. }) => {
                assert_eq!(column, "academic_year");
                assert_eq!(samples, vec!["null".to_string()]);
            }
            other => panic!("erro inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_grade_clamp_policy() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Grades).unwrap();
        let mut grades = table(
            TableName::Grades,
            "grade_value",
            &[DataValue::Integer(150), DataValue::Integer(-5), DataValue::Integer(88)],
        );
        grades.columns.push("grade_type".to_string());
        for row in grades.rows.iter_mut() {
            row.insert("grade_type".to_string(), DataValue::from("Exam"));
        }

        let outcome = apply_domain_rules(&mut grades, schema, GradePolicy::Clamp).unwrap();

        assert_eq!(outcome.clamped, 2);
        let values: Vec<_> = grades.column_values("grade_value").cloned().collect();
        assert_eq!(
            values,
            vec![DataValue::Integer(100), DataValue::Integer(0), DataValue::Integer(88)]
        );
        assert!(grades.column_values("grade_type").all(|v| v == &DataValue::from("exam")));
    }

    #[test]
    fn test_grade_reject_policy() {
        let catalog = Catalog::academic();
        let schema = catalog.schema(TableName::Grades).unwrap();
        let mut grades = table(
            TableName::Grades,
            "grade_value",
            &[DataValue::Integer(150), DataValue::Integer(70)],
        );
        grades.columns.push("grade_type".to_string());
        for row in grades.rows.iter_mut() {
            row.insert("grade_type".to_string(), DataValue::from("test"));
        }

        let err = apply_domain_rules(&mut grades, schema, GradePolicy::Reject).unwrap_err();
        match err {
            ETLError::Validation(ValidationError::Domain { column, samples, .. }) => {
                assert_eq!(column, "grade_value");
                assert_eq!(samples, vec!["150".to_string()]);
            }
            other => panic!("erro inesperado: {:?}", other),
        }
    }
}
