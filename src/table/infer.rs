// src/table/infer.rs
use tracing::trace;

use super::{ColumnType, Value};

/// Cell texts read as missing values.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "TRUE", "true"];
const FALSE_TOKENS: &[&str] = &["False", "FALSE", "false"];

/// True when `raw` should become a NULL cell.
pub fn is_missing(raw: &str) -> bool {
    NA_TOKENS.contains(&raw)
}

fn parse_bool(s: &str) -> Option<bool> {
    if TRUE_TOKENS.contains(&s) {
        Some(true)
    } else if FALSE_TOKENS.contains(&s) {
        Some(false)
    } else {
        None
    }
}

/// Narrowest type every present cell fits in: Integer, then Float, then Boolean,
/// falling back to Text. An all-missing column is Float.
pub fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut int_ok = true;
    let mut float_ok = true;
    let mut bool_ok = true;
    let mut seen = false;

    for cell in cells.into_iter().flatten() {
        seen = true;
        let v = cell.trim();
        if int_ok && v.parse::<i64>().is_err() {
            int_ok = false;
        }
        if float_ok && !int_ok && v.parse::<f64>().is_err() {
            float_ok = false;
        }
        if bool_ok && parse_bool(v).is_none() {
            bool_ok = false;
        }
        if !int_ok && !float_ok && !bool_ok {
            trace!(cell = v, "column falls back to text");
            return ColumnType::Text;
        }
    }

    match (seen, int_ok, float_ok, bool_ok) {
        (false, ..) => ColumnType::Float,
        (true, true, _, _) => ColumnType::Integer,
        (true, false, true, _) => ColumnType::Float,
        (true, false, false, true) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

/// Convert one cell to `ty`. The cell must have been part of the sample that
/// inferred `ty`, so the parse cannot fail; Text is the safety net regardless.
pub fn convert_cell(cell: Option<String>, ty: ColumnType) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let v = raw.trim();
    let converted = match ty {
        ColumnType::Integer => v.parse().ok().map(Value::Int),
        ColumnType::Float => v.parse().ok().map(Value::Float),
        ColumnType::Boolean => parse_bool(v).map(Value::Bool),
        ColumnType::Text => None,
    };
    converted.unwrap_or(Value::Text(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(cells: &[Option<&str>]) -> ColumnType {
        infer_column_type(cells.iter().copied())
    }

    #[test]
    fn integers_stay_integers() {
        assert_eq!(infer(&[Some("1"), Some("-2"), None, Some(" 30 ")]), ColumnType::Integer);
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        assert_eq!(infer(&[Some("1"), Some("2.5"), Some("1e3")]), ColumnType::Float);
        assert_eq!(
            infer(&[Some("99999999999999999999"), Some("1")]),
            ColumnType::Float
        );
    }

    #[test]
    fn booleans_and_text() {
        assert_eq!(infer(&[Some("True"), Some("false"), None]), ColumnType::Boolean);
        assert_eq!(infer(&[Some("True"), Some("1")]), ColumnType::Text);
        assert_eq!(infer(&[Some("LAL"), Some("1")]), ColumnType::Text);
        assert_eq!(infer(&[Some("yes")]), ColumnType::Text);
    }

    #[test]
    fn all_missing_column_is_float() {
        assert_eq!(infer(&[None, None]), ColumnType::Float);
        assert_eq!(infer(&[]), ColumnType::Float);
    }

    #[test]
    fn missing_tokens() {
        for t in ["", "NA", "N/A", "NULL", "NaN", "nan", "null", "None", "<NA>"] {
            assert!(is_missing(t), "{:?}", t);
        }
        for t in ["0", " ", "none", "-"] {
            assert!(!is_missing(t), "{:?}", t);
        }
    }

    #[test]
    fn convert_by_type() {
        assert_eq!(convert_cell(Some(" 7".into()), ColumnType::Integer), Value::Int(7));
        assert_eq!(convert_cell(Some("7".into()), ColumnType::Float), Value::Float(7.0));
        assert_eq!(convert_cell(Some("TRUE".into()), ColumnType::Boolean), Value::Bool(true));
        assert_eq!(
            convert_cell(Some(" padded ".into()), ColumnType::Text),
            Value::Text(" padded ".into())
        );
        assert_eq!(convert_cell(None, ColumnType::Integer), Value::Null);
    }
}
