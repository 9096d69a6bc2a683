use arrow::array::{Array, StringArray};
use std::collections::HashSet;

/// Below this many rows a column is never worth dictionary-encoding.
const MIN_CATEGORICAL_ROWS: usize = 10;
/// Distinct-value ceiling for treating a column as categorical.
const MAX_CATEGORICAL_CARDINALITY: usize = 16;

/// Refined storage type for one column of an all-text batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Plain Utf8, the default and the answer to any ambiguity.
    Text,
    /// Int64; only when every cell is a clean integer.
    Integer,
    /// Dictionary<Int32, Utf8> for low-cardinality columns such as
    /// yes/no flags, status, and regulatory field.
    Categorical,
}

/// Pick a storage type for a column by scanning its values.
///
/// Deliberately conservative: a column is numeric only when *every* cell is
/// a clean integer. CAS numbers (`80-05-7`), EC numbers, and anything with
/// leading zeros or blanks stay textual so they round-trip byte-for-byte.
pub fn infer_kind(values: &StringArray) -> ColumnKind {
    let n = values.len();

    if n > 0
        && (0..n).all(|i| !values.is_null(i) && is_clean_integer(values.value(i)))
    {
        return ColumnKind::Integer;
    }

    if n >= MIN_CATEGORICAL_ROWS {
        let mut distinct = HashSet::new();
        for i in 0..n {
            let v = if values.is_null(i) { "" } else { values.value(i) };
            distinct.insert(v);
            if distinct.len() > MAX_CATEGORICAL_CARDINALITY {
                return ColumnKind::Text;
            }
        }
        return ColumnKind::Categorical;
    }

    ColumnKind::Text
}

/// An integer we can store as Int64 without losing its textual form:
/// digits only, no sign, no leading zero, and short enough not to overflow.
fn is_clean_integer(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 18
        && s.bytes().all(|b| b.is_ascii_digit())
        && !(s.len() > 1 && s.starts_with('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[&str]) -> StringArray {
        StringArray::from(values.to_vec())
    }

    #[test]
    fn years_become_integers() {
        assert_eq!(infer_kind(&col(&["2018", "2021", "1999"])), ColumnKind::Integer);
    }

    #[test]
    fn cas_numbers_stay_text() {
        assert_eq!(infer_kind(&col(&["80-05-7", "1461-22-9"])), ColumnKind::Text);
    }

    #[test]
    fn leading_zeros_stay_text() {
        assert_eq!(infer_kind(&col(&["007", "123"])), ColumnKind::Text);
    }

    #[test]
    fn blanks_block_numeric_coercion() {
        assert_eq!(infer_kind(&col(&["2018", "", "1999"])), ColumnKind::Text);
    }

    #[test]
    fn floats_are_not_integers() {
        assert_eq!(infer_kind(&col(&["80.057", "1.5"])), ColumnKind::Text);
    }

    #[test]
    fn low_cardinality_flag_columns_are_categorical() {
        let values: Vec<&str> = ["yes", "no"].iter().cycle().take(20).copied().collect();
        assert_eq!(infer_kind(&col(&values)), ColumnKind::Categorical);
    }

    #[test]
    fn short_columns_are_never_categorical() {
        assert_eq!(infer_kind(&col(&["yes", "no", "yes"])), ColumnKind::Text);
    }

    #[test]
    fn high_cardinality_stays_text() {
        let values: Vec<String> = (0..40).map(|i| format!("substance-{i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        assert_eq!(infer_kind(&col(&refs)), ColumnKind::Text);
    }

    #[test]
    fn empty_column_defaults_to_text() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(infer_kind(&col(&empty)), ColumnKind::Text);
    }
}
