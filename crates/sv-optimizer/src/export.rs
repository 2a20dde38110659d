//! Columnar export of an archive.
//!
//! One row per evaluation record. Parameter columns follow the search space
//! (inactive parameters are null), then one column per measure, then the
//! bookkeeping columns.

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampNanosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use sv_types::{validation_error, ParamKind, SearchSpace, SvResult};

use crate::archive::{Archive, EvaluationRecord};

const BOOKKEEPING: [&str; 6] = [
    "batch_nr",
    "train_seconds",
    "error",
    "resample_ref",
    "timestamp",
    "record_id",
];

/// Arrow schema of the exported table.
pub fn archive_schema(archive: &Archive, space: &SearchSpace) -> SvResult<Arc<Schema>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();

    for def in &space.parameters {
        let data_type = match def.kind {
            ParamKind::Float { .. } => DataType::Float64,
            ParamKind::Int { .. } => DataType::Int64,
            ParamKind::Bool => DataType::Boolean,
            ParamKind::Categorical { .. } => DataType::Utf8,
        };
        fields.push(Field::new(def.name.as_str(), data_type, true));
        seen.insert(def.name.clone());
    }
    for measure in archive.codomain().measures() {
        fields.push(Field::new(measure.id.as_str(), DataType::Float64, true));
        if !seen.insert(measure.id.clone()) {
            return Err(validation_error!(
                "measure '{}' clashes with a parameter column",
                measure.id
            ));
        }
    }
    for name in BOOKKEEPING {
        if seen.contains(name) {
            return Err(validation_error!("column '{}' is reserved", name));
        }
    }

    fields.extend([
        Field::new("batch_nr", DataType::UInt64, false),
        Field::new("train_seconds", DataType::Float64, false),
        Field::new("error", DataType::Utf8, true),
        Field::new("resample_ref", DataType::Utf8, false),
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            false,
        ),
        Field::new("record_id", DataType::Utf8, false),
    ]);
    Ok(Arc::new(Schema::new(fields)))
}

/// Convert the archive into a single record batch.
pub fn to_record_batch(archive: &Archive, space: &SearchSpace) -> SvResult<RecordBatch> {
    let schema = archive_schema(archive, space)?;
    let records = archive.data();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for def in &space.parameters {
        let values = records.iter().map(|r| r.candidate.get(&def.name));
        let column: ArrayRef = match def.kind {
            ParamKind::Float { .. } => Arc::new(Float64Array::from(
                values.map(|v| v.and_then(|v| v.as_f64())).collect::<Vec<_>>(),
            )),
            ParamKind::Int { .. } => Arc::new(Int64Array::from(
                values.map(|v| v.and_then(|v| v.as_i64())).collect::<Vec<_>>(),
            )),
            ParamKind::Bool => Arc::new(BooleanArray::from(
                values.map(|v| v.and_then(|v| v.as_bool())).collect::<Vec<_>>(),
            )),
            ParamKind::Categorical { .. } => Arc::new(StringArray::from(
                values.map(|v| v.and_then(|v| v.as_str())).collect::<Vec<_>>(),
            )),
        };
        columns.push(column);
    }

    for i in 0..archive.codomain().len() {
        let scores: Vec<Option<f64>> = records
            .iter()
            .map(|r| r.scores.get(i).copied().flatten())
            .collect();
        columns.push(Arc::new(Float64Array::from(scores)));
    }

    columns.push(Arc::new(UInt64Array::from(
        records.iter().map(|r| r.batch_nr as u64).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(Float64Array::from(
        records.iter().map(|r| r.train_seconds).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        records.iter().map(|r| r.error.as_deref()).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        records
            .iter()
            .map(|r| r.resample_ref.to_string())
            .collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(
        TimestampNanosecondArray::from(records.iter().map(timestamp_nanos).collect::<Vec<_>>())
            .with_timezone("UTC"),
    ));
    columns.push(Arc::new(StringArray::from(
        records.iter().map(|r| r.id.to_string()).collect::<Vec<_>>(),
    )));

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn timestamp_nanos(record: &Arc<EvaluationRecord>) -> i64 {
    record.timestamp.timestamp_nanos_opt().unwrap_or(0)
}

/// Write the archive as a parquet file at `path`.
pub fn write_parquet<P: AsRef<Path>>(
    archive: &Archive,
    space: &SearchSpace,
    path: P,
) -> SvResult<()> {
    let batch = to_record_batch(archive, space)?;
    let file = File::create(path.as_ref())?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    tracing::debug!(
        "Wrote {} archive rows to {}",
        batch.num_rows(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::RecordDraft;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use sv_types::{Candidate, Codomain, Condition, Measure};
    use uuid::Uuid;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_categorical("kernel", ["linear", "rbf"])
            .add_float("gamma", 0.0, 1.0)
            .with_condition("gamma", Condition::equals("kernel", "rbf"))
    }

    fn filled_archive() -> Archive {
        let archive = Archive::new(Codomain::single(Measure::minimize("ce")), 2);
        let rbf = Candidate::new().with("kernel", "rbf").with("gamma", 0.25);
        let linear = Candidate::new().with("kernel", "linear");
        archive.append(vec![
            RecordDraft {
                candidate: rbf.clone(),
                x_domain: rbf,
                scores: vec![Some(0.2)],
                train_seconds: 1.5,
                error: None,
                importance: None,
                resample_ref: Uuid::new_v4(),
            },
            RecordDraft {
                candidate: linear.clone(),
                x_domain: linear,
                scores: vec![None],
                train_seconds: 0.0,
                error: Some("diverged".to_string()),
                importance: None,
                resample_ref: Uuid::new_v4(),
            },
        ]);
        archive
    }

    #[test]
    fn inactive_params_and_failures_are_null() {
        let batch = to_record_batch(&filled_archive(), &space()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 2 + 1 + BOOKKEEPING.len());

        let gamma = batch
            .column_by_name("gamma")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(gamma.value(0), 0.25);
        assert!(gamma.is_null(1));

        let ce = batch.column_by_name("ce").unwrap();
        assert!(ce.is_null(1));
        let error = batch
            .column_by_name("error")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(error.value(1), "diverged");
    }

    #[test]
    fn clashing_measure_name_is_rejected() {
        let archive = Archive::new(Codomain::single(Measure::minimize("kernel")), 2);
        assert!(archive_schema(&archive, &space()).is_err());
    }

    #[test]
    fn parquet_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.parquet");
        write_parquet(&filled_archive(), &space(), &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
