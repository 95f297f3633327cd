//! Extratores de tabelas

pub mod csv;
pub mod memory;

pub use self::csv::CsvExtractor;
pub use self::memory::MemoryExtractor;

use crate::types::DataValue;

/// Marcadores de valor ausente aceitos nas fontes.
///
/// A comparação diferencia maiúsculas: "NA" é ausente, mas "Na" é um sobrenome.
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Converte um campo bruto em `DataValue`, mantendo o texto original
pub fn raw_value(field: &str) -> DataValue {
    let trimmed = field.trim();
    if NULL_TOKENS.iter().any(|token| *token == trimmed) {
        DataValue::Null
    } else {
        DataValue::String(field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_null_tokens() {
        for token in ["", "  ", "NULL", "NaN", "n/a", "NA"] {
            assert_eq!(raw_value(token), DataValue::Null, "{:?}", token);
        }
        assert_eq!(raw_value(" 2024 "), DataValue::String(" 2024 ".to_string()));
        assert_eq!(raw_value("nana"), DataValue::String("nana".to_string()));
    }

    #[test]
    fn test_null_tokens_are_case_sensitive() {
        for name in ["Nan", "Na", "nA", "Null"] {
            assert_eq!(raw_value(name), DataValue::from(name), "{:?}", name);
        }
        assert_eq!(raw_value("null"), DataValue::Null);
        assert_eq!(raw_value(" NA "), DataValue::Null);
    }
}
