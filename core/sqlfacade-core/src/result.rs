//! The tabular query result (spec.md §4.3): a field-name header row plus
//! typed value rows, owned cell-for-cell, with provenance metadata.

use crate::bytes::Bytes;
use crate::error::{DbxError, DbxResult};
use crate::types::{StoredValue, TypeDescriptor, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::engine::database::DatabaseInner;

/// A single cell: `None` is SQL NULL, `Some(v)` is a reference-counted,
/// type-tagged value (spec.md §3: "every non-NULL value...is either a
/// Bytes...or a pointer to a value whose dynamic type matches
/// `field_types[j]`" — `StoredValue` plays the role of that pointer).
pub type Cell = Option<StoredValue>;

/// Tabular query result. Row 0 holds field names (as `Bytes` values); rows
/// 1.. hold typed values per column.
#[derive(Debug)]
pub struct DbResult {
    /// `rows[0]` is the header row (field names). `rows[1..]` are data
    /// rows. A freshly-constructed, row-less result has `rows` empty.
    rows: Vec<Vec<Cell>>,
    /// One descriptor per column; `None` marks the "free-form" column of
    /// a table-description result (spec.md §3).
    field_types: Vec<Option<&'static TypeDescriptor>>,
    pub db_name: String,
    pub table_name: String,
    pub successful: bool,
    database: Option<Weak<DatabaseInner>>,
    field_name_index_map: Option<HashMap<String, usize>>,
}

/// spec.md §4.3's cost model: build the name→index map only when a linear
/// scan would cost more than a hash-build-plus-lookup.
fn should_build_map(num_results: usize, num_fields: usize) -> bool {
    num_results * num_fields + num_results > 2 + 4 * num_results
}

impl DbResult {
    /// Construct an empty, unsuccessful result with the given field names
    /// and (optional, per-column) types.
    pub fn new(field_names: Vec<String>, field_types: Vec<Option<&'static TypeDescriptor>>) -> Self {
        assert_eq!(field_names.len(), field_types.len());
        let header: Vec<Cell> = field_names
            .into_iter()
            .map(|n| Some(Arc::new(Value::String(Bytes::from(n.as_str())))))
            .collect();
        DbResult {
            rows: vec![header],
            field_types,
            db_name: String::new(),
            table_name: String::new(),
            successful: false,
            database: None,
            field_name_index_map: None,
        }
    }

    /// An empty, unsuccessful result with no fields at all — the
    /// conservative "most empty value" returned on allocation failure or a
    /// NULL-parameter guard (spec.md §7).
    pub fn empty() -> Self {
        DbResult {
            rows: Vec::new(),
            field_types: Vec::new(),
            db_name: String::new(),
            table_name: String::new(),
            successful: false,
            database: None,
            field_name_index_map: None,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.field_types.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// `num_rows - 1` once a header row is present, else 0.
    pub fn num_results(&self) -> usize {
        self.num_rows().saturating_sub(1)
    }

    pub fn field_types(&self) -> &[Option<&'static TypeDescriptor>] {
        &self.field_types
    }

    pub fn field_name(&self, index: usize) -> Option<String> {
        self.rows.first().and_then(|header| header.get(index)).and_then(|c| {
            c.as_ref().map(|v| match v.as_ref() {
                Value::String(b) => b.as_str_lossy().into_owned(),
                other => crate::types::value::to_string(other),
            })
        })
    }

    pub fn field_names(&self) -> Vec<String> {
        (0..self.num_fields()).filter_map(|i| self.field_name(i)).collect()
    }

    /// Push a fully-typed data row. Panics if the row width doesn't match
    /// `num_fields()` — this is an internal invariant violation, not a
    /// user-facing error condition.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        assert_eq!(row.len(), self.num_fields());
        self.rows.push(row);
    }

    /// Finalize a raw query result: attach provenance and, when the cost
    /// model predicts it pays off, build the name→index map (spec.md
    /// §4.3). Called by the façade after every query.
    pub fn finalize(&mut self, db_name: &str, table_name: &str, database: Weak<DatabaseInner>) {
        self.db_name = db_name.to_string();
        self.table_name = table_name.to_string();
        self.database = Some(database);
        if should_build_map(self.num_results(), self.num_fields()) {
            let mut map = HashMap::with_capacity(self.num_fields());
            for (i, name) in self.field_names().into_iter().enumerate() {
                map.insert(name, i);
            }
            self.field_name_index_map = Some(map);
        } else {
            self.field_name_index_map = None;
        }
    }

    /// Resolve a field name to a column index: via the map when present,
    /// linearly otherwise.
    pub fn get_field_index_by_name(&self, name: &str) -> Option<usize> {
        if let Some(map) = &self.field_name_index_map {
            return map.get(name).copied();
        }
        (0..self.num_fields()).find(|&i| self.field_name(i).as_deref() == Some(name))
    }

    /// Fetch a cell by (row, column). Row `0` is the header. For a
    /// string/bytes column with a stored NULL, returns an empty `Bytes`
    /// sentinel rather than `None`, so consumers can safely call string
    /// ops on the result (spec.md §4.3).
    pub fn get_by_index(&self, row: usize, field: usize) -> DbxResult<StoredValue> {
        let cell = self
            .rows
            .get(row)
            .and_then(|r| r.get(field))
            .ok_or_else(|| DbxError::FieldNotFound(field.to_string()))?;
        match cell {
            Some(v) => Ok(Arc::clone(v)),
            None => match self.field_types.get(field).copied().flatten() {
                Some(td) if matches!(td.kind, crate::types::TypeKind::String | crate::types::TypeKind::Bytes | crate::types::TypeKind::StringCi) => {
                    Ok(Arc::new(td.create(None)))
                }
                _ => Ok(Arc::new(Value::Null)),
            },
        }
    }

    pub fn get_by_name(&self, row: usize, name: &str) -> DbxResult<StoredValue> {
        let idx = self
            .get_field_index_by_name(name)
            .ok_or_else(|| DbxError::FieldNotFound(name.to_string()))?;
        self.get_by_index(row, idx)
    }

    /// Destroy the existing cell and install a freshly-copied value.
    pub fn set_by_index(&mut self, row: usize, field: usize, value: &Value) -> DbxResult<()> {
        let td = self
            .field_types
            .get(field)
            .copied()
            .flatten()
            .ok_or_else(|| DbxError::FieldNotFound(field.to_string()))?;
        let copied = Arc::new(td.copy(&Arc::new(value.clone())).as_ref().clone());
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(field))
            .ok_or_else(|| DbxError::FieldNotFound(field.to_string()))?;
        *cell = Some(copied);
        Ok(())
    }

    pub fn set_by_name(&mut self, row: usize, name: &str, value: &Value) -> DbxResult<()> {
        let idx = self
            .get_field_index_by_name(name)
            .ok_or_else(|| DbxError::FieldNotFound(name.to_string()))?;
        self.set_by_index(row, idx, value)
    }

    /// First data-row index where every (field, value) in `criteria`
    /// string-equals the corresponding stringified cell, or `None`.
    /// Stringifies both sides (spec.md §4.3, Open Question #3: this loses
    /// floating-point precision by design, preserved for compatibility).
    pub fn result_index_by_lookup(&self, criteria: &[(&str, &str)]) -> Option<usize> {
        'row: for row in 1..self.rows.len() {
            for (field, expected) in criteria {
                let idx = self.get_field_index_by_name(field)?;
                let cell = self.rows[row].get(idx)?;
                let actual = match cell {
                    Some(v) => crate::types::value::to_string(v),
                    None => String::new(),
                };
                if actual != *expected {
                    continue 'row;
                }
            }
            return Some(row - 1);
        }
        None
    }

    /// A new, owned result containing copies of data rows `[start, end)`
    /// (0-indexed into the result set, not into `rows`), carrying forward
    /// field names/types and provenance.
    pub fn get_range(&self, start: usize, end: usize) -> DbxResult<DbResult> {
        if start > end || end > self.num_results() {
            return Err(DbxError::InvalidRange {
                start,
                end,
                num_results: self.num_results(),
            });
        }
        let mut out = DbResult::new(self.field_names(), self.field_types.clone());
        out.db_name = self.db_name.clone();
        out.table_name = self.table_name.clone();
        out.database = self.database.clone();
        out.successful = self.successful;
        for row in &self.rows[(start + 1)..(end + 1)] {
            out.rows.push(row.clone());
        }
        Ok(out)
    }

    /// Deep-copy every cell using the column type's copy function.
    pub fn copy(&self) -> DbResult {
        let mut out = DbResult::new(self.field_names(), self.field_types.clone());
        out.db_name = self.db_name.clone();
        out.table_name = self.table_name.clone();
        out.database = self.database.clone();
        out.successful = self.successful;
        out.field_name_index_map = self.field_name_index_map.clone();
        for row in &self.rows[1..] {
            let copied_row: Vec<Cell> = row
                .iter()
                .enumerate()
                .map(|(j, cell)| {
                    cell.as_ref().map(|v| {
                        let td = self.field_types.get(j).copied().flatten();
                        match td {
                            Some(td) => td.copy(v),
                            None => Arc::new((**v).clone()),
                        }
                    })
                })
                .collect();
            out.rows.push(copied_row);
        }
        out
    }

    /// Equal when field counts, field names, field types (by pointer
    /// identity), result counts, and every cell (under its column's
    /// comparator) agree.
    pub fn eq_result(&self, other: &DbResult) -> bool {
        if self.num_fields() != other.num_fields() {
            return false;
        }
        if self.field_names() != other.field_names() {
            return false;
        }
        for (a, b) in self.field_types.iter().zip(other.field_types.iter()) {
            match (a, b) {
                (Some(a), Some(b)) => {
                    if !std::ptr::eq(*a, *b) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        if self.num_results() != other.num_results() {
            return false;
        }
        for row_idx in 1..self.rows.len() {
            for col in 0..self.num_fields() {
                let a = &self.rows[row_idx][col];
                let b = &other.rows[row_idx][col];
                match (a, b) {
                    (None, None) => {}
                    (Some(a), Some(b)) => {
                        let cmp = match self.field_types[col] {
                            Some(td) => td.compare(a, b),
                            None => crate::types::value::compare(a, b),
                        };
                        if cmp != std::cmp::Ordering::Equal {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
        }
        true
    }

    /// Emit `"field"`-quoted CSV: quoted header, quoted string/bytes data
    /// cells, un-quoted numeric cells, `,` delimiter, `\r\n` terminator.
    pub fn to_csv(&self) -> String {
        fn quote(s: &str) -> String {
            format!("\"{}\"", s.replace('"', "\"\""))
        }
        let mut out = String::new();
        let header: Vec<String> = self.field_names().iter().map(|n| quote(n)).collect();
        out.push_str(&header.join(","));
        out.push_str("\r\n");
        for row in &self.rows[1.min(self.rows.len())..] {
            let mut cells = Vec::with_capacity(row.len());
            for (j, cell) in row.iter().enumerate() {
                let td = self.field_types.get(j).copied().flatten();
                let rendered = match cell {
                    None => String::new(),
                    Some(v) => {
                        let s = crate::types::value::to_string(v);
                        let is_text = matches!(
                            td.map(|d| d.kind),
                            Some(crate::types::TypeKind::String)
                                | Some(crate::types::TypeKind::StringCi)
                                | Some(crate::types::TypeKind::Bytes)
                        );
                        if is_text {
                            quote(&s)
                        } else {
                            s
                        }
                    }
                };
                cells.push(rendered);
            }
            out.push_str(&cells.join(","));
            out.push_str("\r\n");
        }
        out
    }

    /// Same shape as [`to_csv`](Self::to_csv) but with caller-specified
    /// delimiters and no quoting.
    pub fn to_delimited(&self, record_delim: &str, field_delim: &str) -> String {
        let mut out = String::new();
        out.push_str(&self.field_names().join(field_delim));
        out.push_str(record_delim);
        for row in &self.rows[1.min(self.rows.len())..] {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    None => String::new(),
                    Some(v) => crate::types::value::to_string(v),
                })
                .collect();
            out.push_str(&cells.join(field_delim));
            out.push_str(record_delim);
        }
        out
    }

    pub fn database(&self) -> Option<Weak<DatabaseInner>> {
        self.database.clone()
    }

    /// Present for API parity with the spec's explicit `free_result`
    /// operation; Rust's `Drop` already frees every owned cell when the
    /// value goes out of scope.
    pub fn free(self) {
        drop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn sample() -> DbResult {
        let mut r = DbResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Some(&crate::types::I64), Some(&crate::types::STRING)],
        );
        for i in 0..10i64 {
            r.push_row(vec![
                Some(Arc::new(Value::I64(i))),
                Some(Arc::new(Value::String(Bytes::from(format!("row-{i}").as_str())))),
            ]);
        }
        r.successful = true;
        r
    }

    #[test]
    fn ownership_copy_does_not_affect_original() {
        let r = sample();
        let copied = r.copy();
        drop(copied.copy());
        assert_eq!(r.num_results(), 10);
        assert!(r.eq_result(&r.copy()));
    }

    #[test]
    fn range_slice_matches_cell_for_cell() {
        let r = sample();
        let s = r.get_range(3, 7).unwrap();
        assert_eq!(s.num_results(), 4);
        let a = r.get_by_index(4, 0).unwrap();
        let b = s.get_by_index(1, 0).unwrap();
        assert_eq!(crate::types::value::compare(&a, &b), std::cmp::Ordering::Equal);
    }

    #[test]
    fn invalid_range_is_rejected() {
        let r = sample();
        assert!(r.get_range(8, 3).is_err());
        assert!(r.get_range(0, 99).is_err());
    }

    #[test]
    fn get_by_name_resolves_through_map_or_linear_scan() {
        let r = sample();
        let name_cell = r.get_by_name(3, "name").unwrap();
        assert_eq!(crate::types::value::to_string(&name_cell), "row-2");
    }

    #[test]
    fn set_by_index_replaces_cell() {
        let mut r = sample();
        r.set_by_index(1, 1, &Value::String(Bytes::from("replaced"))).unwrap();
        let v = r.get_by_index(1, 1).unwrap();
        assert_eq!(crate::types::value::to_string(&v), "replaced");
    }

    #[test]
    fn null_string_cell_returns_empty_sentinel() {
        let mut r = DbResult::new(vec!["v".to_string()], vec![Some(&crate::types::STRING)]);
        r.push_row(vec![None]);
        let v = r.get_by_index(1, 0).unwrap();
        assert!(matches!(v.as_ref(), Value::String(b) if b.length() == 0));
    }

    #[test]
    fn lookup_by_criteria_finds_first_match() {
        let r = sample();
        let idx = r.result_index_by_lookup(&[("name", "row-5")]);
        assert_eq!(idx, Some(5));
        assert_eq!(r.result_index_by_lookup(&[("name", "missing")]), None);
    }

    #[test]
    fn csv_quotes_text_and_escapes_quotes() {
        let mut r = DbResult::new(vec!["name".to_string()], vec![Some(&crate::types::STRING)]);
        r.push_row(vec![Some(Arc::new(Value::String(Bytes::from("a\"b"))))]);
        let csv = r.to_csv();
        assert!(csv.contains("\"a\"\"b\""));
        assert!(csv.ends_with("\r\n"));
    }

    #[test]
    fn map_cost_model_matches_spec_formula() {
        assert!(!should_build_map(1, 2));
        assert!(should_build_map(1000, 50));
    }

    #[test]
    fn field_type_identity_drives_equality() {
        let a = sample();
        let mut b = DbResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Some(&crate::types::I64_NOCOPY), Some(&crate::types::STRING)],
        );
        b.push_row(vec![
            Some(Arc::new(Value::I64(0))),
            Some(Arc::new(Value::String(Bytes::from("row-0")))),
        ]);
        assert!(!a.eq_result(&b));
    }
}
