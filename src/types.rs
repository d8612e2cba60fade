//! Core data model types for the pipeline.
//!
//! Every stage of the pipeline consumes and produces an in-memory [`DataSet`]: an ordered
//! sequence of rows stored against a [`Schema`] (a list of typed [`Field`]s). Stages never
//! mutate their input; they build a new dataset, which keeps re-running a stage safe.

use std::collections::HashMap;

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether a field with this exact name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Whether this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the inner string, if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to `f64`; everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Render the value as cell text, or `None` for null.
    ///
    /// Integral floats render without a fractional part. Spreadsheet loaders routinely hand
    /// identifiers and phone numbers over as `Float64`, so `5511999990000.0` must come back
    /// as `"5511999990000"`, not in scientific notation or with a `.0` tail.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Utf8(s) => Some(s.clone()),
            Value::Int64(v) => Some(v.to_string()),
            Value::Float64(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    Some(format!("{:.0}", v))
                } else {
                    Some(v.to_string())
                }
            }
            Value::Bool(v) => Some(v.to_string()),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Default for DataSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// A dataset with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            schema: Schema::new(Vec::new()),
            rows: Vec::new(),
        }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Column index by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Whether a column with this exact name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.schema.has_field(name)
    }

    /// Borrow the value at `(row, column-name)`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Cell text at `(row, column-name)`; `None` for nulls and missing coordinates.
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.value(row, column)?.to_text()
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Create a new dataset by applying `mapper` to every row.
    ///
    /// The returned dataset preserves the original schema.
    ///
    /// # Panics
    ///
    /// Panics if `mapper` returns a row with a different length than the schema field count.
    pub fn map_rows<F>(&self, mut mapper: F) -> Self
    where
        F: FnMut(&[Value]) -> Vec<Value>,
    {
        let expected_len = self.schema.fields.len();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let out = mapper(row.as_slice());
                assert!(
                    out.len() == expected_len,
                    "mapped row length {} does not match schema length {}",
                    out.len(),
                    expected_len
                );
                out
            })
            .collect();

        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Create a new dataset with `column` set to `values`, one per row.
    ///
    /// If a field with the same name already exists it is overwritten in place (keeping its
    /// position); otherwise the column is appended at the end of the schema.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the row count.
    pub fn with_column(&self, field: Field, values: Vec<Value>) -> Self {
        assert!(
            values.len() == self.row_count(),
            "column '{}' has {} values for {} rows",
            field.name,
            values.len(),
            self.row_count()
        );

        let mut out = self.clone();
        match out.schema.index_of(&field.name) {
            Some(idx) => {
                out.schema.fields[idx] = field;
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                out.schema.fields.push(field);
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        out
    }

    /// Rename columns according to `(from, to)` pairs.
    ///
    /// Names not present in the schema are ignored, which makes the operation idempotent:
    /// applying the same map twice leaves already-renamed columns untouched.
    pub fn rename_columns(&self, map: &[(&str, &str)]) -> Self {
        let lookup: HashMap<&str, &str> = map.iter().copied().collect();
        let mut out = self.clone();
        for field in &mut out.schema.fields {
            if let Some(new_name) = lookup.get(field.name.as_str()) {
                field.name = (*new_name).to_string();
            }
        }
        out
    }

    /// Reorder columns so that those named in `prefix` (and present) come first, in the given
    /// order, followed by all remaining columns in their existing order.
    pub fn reorder_with_prefix(&self, prefix: &[&str]) -> Self {
        let mut order: Vec<usize> = Vec::with_capacity(self.column_count());
        for name in prefix {
            if let Some(idx) = self.column_index(name) {
                if !order.contains(&idx) {
                    order.push(idx);
                }
            }
        }
        for idx in 0..self.column_count() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }

        let fields = order
            .iter()
            .map(|&i| self.schema.fields[i].clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Self {
            schema: Schema::new(fields),
            rows,
        }
    }

    /// Create a new dataset with rows reordered by `compare` (stable).
    pub fn sorted_by<F>(&self, mut compare: F) -> Self
    where
        F: FnMut(&[Value], &[Value]) -> std::cmp::Ordering,
    {
        let mut indices: Vec<usize> = (0..self.row_count()).collect();
        indices.sort_by(|&a, &b| compare(self.rows[a].as_slice(), self.rows[b].as_slice()));
        self.select_rows(&indices)
    }

    /// Create a new dataset containing the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Concatenate datasets by column name.
    ///
    /// The first dataset with at least one column defines the result schema; rows from later
    /// datasets are aligned by column name, with columns absent from a source filled with
    /// [`Value::Null`]. Enrichment workbooks arrive as one dataset per sheet, and the sheets
    /// do not always agree on column order.
    pub fn concat_by_name(datasets: &[DataSet]) -> DataSet {
        let Some(base) = datasets.iter().find(|ds| ds.column_count() > 0) else {
            return DataSet::empty();
        };
        let schema = base.schema.clone();

        let mut rows = Vec::new();
        for ds in datasets {
            if ds.column_count() == 0 {
                continue;
            }
            let mapping: Vec<Option<usize>> = schema
                .fields
                .iter()
                .map(|f| ds.column_index(&f.name))
                .collect();
            for row in &ds.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|m| match m {
                            Some(idx) => row[*idx].clone(),
                            None => Value::Null,
                        })
                        .collect(),
                );
            }
        }
        DataSet::new(schema, rows)
    }
}
