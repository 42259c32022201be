//! Row → JSON conversion shared by the dialect modules

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::{Column, Row};

use super::QueryOutput;

/// Try each listed type in order and convert the first that decodes.
///
/// `try_get` checks type compatibility before decoding, so a mismatch simply
/// falls through to the next candidate. NULLs decode as `None` on the first
/// attempt and become `Value::Null`.
macro_rules! try_decode {
    ($row:expr, $idx:expr, $($ty:ty => $conv:expr),+ $(,)?) => {
        $(
            if let Ok(v) = $row.try_get::<Option<$ty>, _>($idx) {
                return v.map($conv).unwrap_or(serde_json::Value::Null);
            }
        )+
    };
}
pub(super) use try_decode;

/// Column names made unique with `_1`, `_2`, ... suffixes so that
/// `SELECT e.name, d.name` keeps both values.
pub(super) fn unique_column_names<R: Row>(row: &R) -> Vec<String> {
    let mut seen = HashSet::new();
    row.columns()
        .iter()
        .map(|col| {
            let base = col.name();
            let mut name = base.to_owned();
            let mut n = 0;
            while !seen.insert(name.clone()) {
                n += 1;
                name = format!("{}_{}", base, n);
            }
            name
        })
        .collect()
}

/// Folds the items of `fetch_many` into a [`QueryOutput`].
///
/// `rows_affected` adds up over every statement. `columns` and `data`
/// describe the last statement that returned rows.
pub(super) struct ResultCollector {
    output: QueryOutput,
    /// Next row belongs to a new statement
    new_statement: bool,
}

impl ResultCollector {
    pub(super) fn new() -> Self {
        Self {
            output: QueryOutput::default(),
            new_statement: true,
        }
    }

    pub(super) fn statement_done(&mut self, rows_affected: u64) {
        self.output.rows_affected += rows_affected;
        self.new_statement = true;
    }

    pub(super) fn row<R: Row>(&mut self, row: &R, decode: fn(&R, usize) -> Value) {
        if self.new_statement {
            self.output.columns = unique_column_names(row);
            self.output.data.clear();
            self.new_statement = false;
        }

        let map: Map<String, Value> = self
            .output
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), decode(row, idx)))
            .collect();
        self.output.data.push(map);
    }

    pub(super) fn finish(self) -> QueryOutput {
        self.output
    }
}

pub(super) fn int(v: i64) -> Value {
    Value::Number(v.into())
}

pub(super) fn uint(v: u64) -> Value {
    Value::Number(v.into())
}

/// Non-finite floats have no JSON form.
pub(super) fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Exact decimals travel as text; an f64 would round money columns.
pub(super) fn decimal(v: Decimal) -> Value {
    Value::String(v.to_string())
}

pub(super) fn bytes(v: Vec<u8>) -> Value {
    Value::String(format!("0x{}", hex::encode(v)))
}
