//! Dataset <-> bytes codecs for the supported formats
//!
//! | Format  | Encoding                      | Read back as                   |
//! |---------|-------------------------------|--------------------------------|
//! | Parquet | Arrow writer, snappy pages    | exact schema and values        |
//! | CSV     | header row + comma-delimited  | every column as nullable text  |
//! | JSON    | one object per line, nulls kept | types inferred from the values |
//!
//! Only Parquet round-trips exactly. The text formats are lossy for types and
//! read empty CSV fields back as nulls. Every format keeps the column names
//! and their order; a JSON column that is null in every row comes back with
//! the `Null` type.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::json::writer::LineDelimited;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use medallion_common::checksum::compute_digest;
use medallion_common::types::Format;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::dataset::Dataset;
use crate::error::Result;

pub fn serialize(dataset: &Dataset, format: Format) -> Result<Bytes> {
    let bytes = match format {
        Format::Parquet => write_parquet(dataset)?,
        Format::Csv => write_csv(dataset)?,
        Format::Json => write_json_lines(dataset)?,
    };
    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: Bytes, format: Format) -> Result<Dataset> {
    match format {
        Format::Parquet => read_parquet(data),
        Format::Csv => read_csv(&data),
        Format::Json => read_json_lines(&data),
    }
}

/// Hex digest of the dataset serialized in `format`.
///
/// Provenance only: identical content stored under two different keys is not
/// detected as a duplicate.
pub fn checksum(dataset: &Dataset, format: Format) -> Result<String> {
    Ok(compute_digest(&serialize(dataset, format)?))
}

fn write_parquet(dataset: &Dataset) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, dataset.schema(), Some(props))?;
    writer.write(dataset.batch())?;
    writer.close()?;

    Ok(buffer)
}

fn read_parquet(data: Bytes) -> Result<Dataset> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Dataset::new(concat_batches(&schema, &batches)?))
}

fn write_csv(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(Vec::new());
    writer.write(dataset.batch())?;

    Ok(writer.into_inner())
}

fn read_csv(data: &[u8]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Dataset::empty());
    }

    let mut builders: Vec<StringBuilder> = headers.iter().map(|_| StringBuilder::new()).collect();
    for record in reader.records() {
        let record = record?;
        for (builder, value) in builders.iter_mut().zip(record.iter()) {
            if value.is_empty() {
                builder.append_null();
            } else {
                builder.append_value(value);
            }
        }
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = builders
        .iter_mut()
        .map(|b| Arc::new(b.finish()) as ArrayRef)
        .collect();

    Ok(Dataset::new(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?))
}

fn write_json_lines(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut writer = arrow::json::WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, LineDelimited>(Vec::new());
    writer.write(dataset.batch())?;
    writer.finish()?;

    Ok(writer.into_inner())
}

fn read_json_lines(data: &[u8]) -> Result<Dataset> {
    let (inferred, _) =
        arrow::json::reader::infer_json_schema_from_seekable(Cursor::new(data), None)?;
    let schema = Arc::new(in_key_order(inferred, data)?);

    let batches = arrow::json::ReaderBuilder::new(schema.clone())
        .build(Cursor::new(data))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Dataset::new(concat_batches(&schema, &batches)?))
}

/// Reorder inferred fields to the key order of the first object.
///
/// Keys that only appear on later lines go last, in inferred order.
fn in_key_order(inferred: Schema, data: &[u8]) -> Result<Schema> {
    let Some(first_line) = data
        .split(|b| *b == b'\n')
        .find(|line| !line.iter().all(u8::is_ascii_whitespace))
    else {
        return Ok(inferred);
    };
    let first: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(first_line)?;

    let mut fields: Vec<FieldRef> = first
        .keys()
        .filter_map(|name| inferred.field_with_name(name).ok())
        .map(|field| Arc::new(field.clone()))
        .collect();
    fields.extend(
        inferred
            .fields()
            .iter()
            .filter(|field| !first.contains_key(field.name()))
            .cloned(),
    );

    Ok(Schema::new(fields))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray};

    fn sample() -> Dataset {
        Dataset::from_columns([
            ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            (
                "amount",
                Arc::new(Float64Array::from(vec![Some(12.5), None, Some(-3.0)])) as ArrayRef,
            ),
            (
                "merchant",
                Arc::new(StringArray::from(vec![Some("acme"), Some("globex"), None])) as ArrayRef,
            ),
            (
                "is_fraud",
                Arc::new(BooleanArray::from(vec![false, true, false])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_parquet_round_trip_is_exact() {
        let original = sample();
        let bytes = serialize(&original, Format::Parquet).unwrap();
        let restored = deserialize(bytes, Format::Parquet).unwrap();

        assert_eq!(restored, original);
        assert_eq!(restored.schema().field(0).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_parquet_keeps_schema_without_rows() {
        let original = Dataset::new(sample().batch().slice(0, 0));
        let bytes = serialize(&original, Format::Parquet).unwrap();
        let restored = deserialize(bytes, Format::Parquet).unwrap();

        assert_eq!(restored.num_rows(), 0);
        assert_eq!(restored.column_names(), original.column_names());
    }

    #[test]
    fn test_csv_reads_back_as_text() {
        let bytes = serialize(&sample(), Format::Csv).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("id,amount,merchant,is_fraud\n"));

        let restored = deserialize(bytes, Format::Csv).unwrap();
        assert_eq!(restored.column_names(), sample().column_names());
        assert_eq!(restored.num_rows(), 3);
        assert!(restored
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Utf8));

        let ids = restored
            .batch()
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ids.value(2), "3");

        let amounts = restored.batch().column(1);
        assert!(amounts.is_null(1));
    }

    #[test]
    fn test_csv_empty_input_is_empty_dataset() {
        let restored = deserialize(Bytes::new(), Format::Csv).unwrap();
        assert_eq!(restored.num_columns(), 0);
        assert_eq!(restored.num_rows(), 0);
    }

    #[test]
    fn test_json_lines_one_object_per_row() {
        let bytes = serialize(&sample(), Format::Json).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("\"merchant\":\"acme\""));

        let restored = deserialize(bytes, Format::Json).unwrap();
        assert_eq!(restored.num_rows(), 3);
        assert_eq!(restored.schema().field_with_name("id").unwrap().data_type(), &DataType::Int64);
    }

    fn sparse() -> Dataset {
        Dataset::from_columns([
            ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            (
                "merchant",
                Arc::new(StringArray::from(vec![None, Some("acme"), Some("globex")])) as ArrayRef,
            ),
            (
                "note",
                Arc::new(StringArray::from(vec![None::<&str>, None, None])) as ArrayRef,
            ),
            (
                "amount",
                Arc::new(Float64Array::from(vec![1.5, 2.5, 3.5])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_json_lines_keep_column_order_and_null_columns() {
        let bytes = serialize(&sparse(), Format::Json).unwrap();
        let first = std::str::from_utf8(&bytes).unwrap().lines().next().unwrap().to_string();
        assert!(first.contains("\"merchant\":null"));
        assert!(first.contains("\"note\":null"));

        let restored = deserialize(bytes, Format::Json).unwrap();
        assert_eq!(restored.column_names(), vec!["id", "merchant", "note", "amount"]);
        assert_eq!(restored.num_rows(), 3);
        assert_eq!(restored.schema().field(2).data_type(), &DataType::Null);

        let merchants = restored
            .batch()
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert!(merchants.is_null(0));
        assert_eq!(merchants.value(1), "acme");
    }

    #[test]
    fn test_csv_keeps_all_null_column() {
        let bytes = serialize(&sparse(), Format::Csv).unwrap();
        let restored = deserialize(bytes, Format::Csv).unwrap();

        assert_eq!(restored.column_names(), vec!["id", "merchant", "note", "amount"]);
        let notes = restored.batch().column(2);
        assert_eq!(notes.null_count(), 3);
        assert!(restored.batch().column(1).is_null(0));
    }

    #[test]
    fn test_checksum_is_deterministic_per_format() {
        let a = checksum(&sample(), Format::Parquet).unwrap();
        let b = checksum(&sample(), Format::Parquet).unwrap();
        let c = checksum(&sample(), Format::Csv).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, c);
    }
}
