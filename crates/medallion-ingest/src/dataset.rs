//! In-memory tabular dataset

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{IngestError, Result};

/// Ordered, named columns with zero or more rows.
///
/// Backed by a single Arrow [`RecordBatch`], so column order and types are
/// stable. The ingestion core never mutates a dataset in place; hooks take one
/// by value and return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// No columns, no rows
    pub fn empty() -> Self {
        Self::new(RecordBatch::new_empty(Arc::new(Schema::empty())))
    }

    /// Build from `(name, column)` pairs; all columns must have equal length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ArrayRef)>,
        S: AsRef<str>,
    {
        Ok(Self::new(RecordBatch::try_from_iter(columns)?))
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Row-wise union in the given order.
    ///
    /// Column-less datasets (e.g. read from an empty object) are skipped. The
    /// remaining parts must have the same column names and types; columns are
    /// matched by name and laid out in the first part's order. A column typed
    /// `Null` in some parts (all values null) takes its type from the others.
    pub fn concat(parts: Vec<Dataset>) -> Result<Dataset> {
        let batches: Vec<RecordBatch> = parts
            .into_iter()
            .map(Dataset::into_batch)
            .filter(|b| b.num_columns() > 0)
            .collect();

        let Some(first) = batches.first() else {
            return Ok(Dataset::empty());
        };
        let schema = unified_schema(&first.schema(), &batches)?;

        let aligned = batches
            .iter()
            .map(|batch| align(batch, &schema))
            .collect::<Result<Vec<_>>>()?;

        Ok(Dataset::new(concat_batches(&schema, &aligned)?))
    }
}

fn unified_schema(first: &Schema, batches: &[RecordBatch]) -> Result<SchemaRef> {
    let mut fields: Vec<Field> = first.fields().iter().map(|f| f.as_ref().clone()).collect();

    for batch in batches {
        let other = batch.schema();
        let mismatch = || {
            IngestError::SchemaMismatch(format!(
                "expected [{}], found [{}]",
                field_list(first),
                field_list(&other)
            ))
        };

        if other.fields().len() != fields.len() {
            return Err(mismatch());
        }

        for field in fields.iter_mut() {
            let candidate = other.field_with_name(field.name()).map_err(|_| mismatch())?;
            let nullable = field.is_nullable() || candidate.is_nullable();

            if candidate.data_type() == field.data_type() || candidate.data_type() == &DataType::Null {
                *field = field.clone().with_nullable(nullable);
            } else if field.data_type() == &DataType::Null {
                *field = field
                    .clone()
                    .with_data_type(candidate.data_type().clone())
                    .with_nullable(true);
            } else {
                return Err(mismatch());
            }
        }
    }

    Ok(Arc::new(Schema::new_with_metadata(fields, first.metadata().clone())))
}

/// Reorder `batch` to `schema`, casting all-null columns to the target type
fn align(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let column = batch.column_by_name(field.name()).ok_or_else(|| {
                IngestError::SchemaMismatch(format!("missing column '{}'", field.name()))
            })?;
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                Ok(cast(column, field.data_type())?)
            }
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

impl From<RecordBatch> for Dataset {
    fn from(batch: RecordBatch) -> Self {
        Self::new(batch)
    }
}

fn field_list(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| format!("{}: {}", f.name(), f.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, NullArray, StringArray};

    fn transactions(ids: Vec<i64>, amounts: Vec<f64>) -> Dataset {
        Dataset::from_columns([
            ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
            ("amount", Arc::new(Float64Array::from(amounts)) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_column_order() {
        let ds = transactions(vec![1, 2, 3], vec![9.5, 10.0, 0.25]);
        assert_eq!(ds.num_rows(), 3);
        assert_eq!(ds.num_columns(), 2);
        assert_eq!(ds.column_names(), vec!["id", "amount"]);
        assert!(!ds.is_empty());
        assert!(Dataset::empty().is_empty());
    }

    #[test]
    fn test_concat_preserves_row_order() {
        let a = transactions(vec![1, 2], vec![1.0, 2.0]);
        let b = transactions(vec![3], vec![3.0]);
        let merged = Dataset::concat(vec![a, Dataset::empty(), b]).unwrap();

        assert_eq!(merged, transactions(vec![1, 2, 3], vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let merged = Dataset::concat(Vec::new()).unwrap();
        assert_eq!(merged.num_rows(), 0);
        assert_eq!(merged.num_columns(), 0);
    }

    #[test]
    fn test_concat_matches_columns_by_name() {
        let a = transactions(vec![1], vec![1.0]);
        let b = Dataset::from_columns([
            ("amount", Arc::new(Float64Array::from(vec![2.0])) as ArrayRef),
            ("id", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
        ])
        .unwrap();

        let merged = Dataset::concat(vec![a, b]).unwrap();
        assert_eq!(merged, transactions(vec![1, 2], vec![1.0, 2.0]));
    }

    #[test]
    fn test_concat_resolves_all_null_columns() {
        let all_null = Dataset::from_columns([
            ("id", Arc::new(Int64Array::from(vec![1])) as ArrayRef),
            ("merchant", Arc::new(NullArray::new(1)) as ArrayRef),
        ])
        .unwrap();
        let typed = Dataset::from_columns([
            ("id", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
            ("merchant", Arc::new(StringArray::from(vec!["acme"])) as ArrayRef),
        ])
        .unwrap();

        let merged = Dataset::concat(vec![all_null, typed]).unwrap();
        assert_eq!(merged.column_names(), vec!["id", "merchant"]);
        assert_eq!(merged.schema().field(1).data_type(), &DataType::Utf8);

        let merchants = merged
            .batch()
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(merchants.is_null(0));
        assert_eq!(merchants.value(1), "acme");
    }

    #[test]
    fn test_concat_rejects_mismatched_columns() {
        let a = transactions(vec![1], vec![1.0]);
        let b = Dataset::from_columns([(
            "merchant",
            Arc::new(StringArray::from(vec!["acme"])) as ArrayRef,
        )])
        .unwrap();

        let err = Dataset::concat(vec![a, b]).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch(_)));
    }
}
