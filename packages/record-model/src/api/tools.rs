//! Row tools

use std::collections::BTreeMap;

use crate::domain::{Row, Value};

fn same(a: &Value, b: &Value) -> bool {
    a == b || a.sql_eq(b)
}

/// Columns of `new` that are absent from `old` or hold a different value
///
/// Booleans and integers compare numerically, so `true` vs `1` is no change.
pub fn diff_rows(old: &Row, new: &Row) -> Row {
    new.iter()
        .filter(|(column, value)| !old.get(column).is_some_and(|prev| same(prev, value)))
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

/// Key rows by the text form of `column`; later rows win on duplicate keys
/// and rows without the column are left out
pub fn index_by(rows: impl IntoIterator<Item = Row>, column: &str) -> BTreeMap<String, Row> {
    rows.into_iter()
        .filter_map(|row| {
            let key = row.get(column).filter(|v| !v.is_null())?.to_string();
            Some((key, row))
        })
        .collect()
}
