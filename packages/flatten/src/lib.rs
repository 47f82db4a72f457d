#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flattens raw road uploads into one row per vertex.
//!
//! Each [`CoordinateRecord`] carries a nested `road_coordinates` literal.
//! Flattening parses it (see [`parse`]), numbers the record's segments from
//! 1, and emits one [`FlatPoint`] per coordinate pair. A record whose
//! coordinates cannot be parsed is skipped with a [`RecordWarning`]; the
//! rest of the input is still processed.
//!
//! CSV input is read and written in fixed-size batches so that only one
//! batch of parsed records is held in memory at a time. Batching never
//! changes the output: record order and per-record segment numbering are
//! the same for every batch size.

pub mod parse;
pub mod split;

use std::io::{Read, Write};

use csv::StringRecord;

use road_gap_models::progress::ProgressCallback;
use road_gap_models::{CoordinateRecord, FlatPoint, PASSTHROUGH_COLUMNS};

pub use parse::MalformedCoordinateError;

/// Column holding the nested coordinate literal.
pub const COORDINATES_COLUMN: &str = "road_coordinates";

/// Errors that abort a whole flattening or split call.
#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input column is absent.
    #[error("Input is missing required column '{column}'")]
    MissingColumn {
        /// Name of the absent column.
        column: &'static str,
    },

    /// A batch size of zero was requested.
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
}

/// A record that was skipped because its coordinates could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWarning {
    /// Identifier of the skipped record.
    pub record_id: String,
    /// Why it was skipped.
    pub error: MalformedCoordinateError,
}

/// Summary of a flattening run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Records read, including skipped ones.
    pub records: usize,
    /// Flat points emitted.
    pub points: usize,
    /// Coordinates dropped for having fewer than two numeric components.
    pub dropped_points: usize,
    /// Records skipped entirely, in input order.
    pub warnings: Vec<RecordWarning>,
}

/// Header of the flat point table: the passthrough columns followed by
/// `segment_id`, `x` and `y`.
#[must_use]
pub fn flat_point_columns() -> Vec<&'static str> {
    PASSTHROUGH_COLUMNS
        .iter()
        .copied()
        .chain(["segment_id", "x", "y"])
        .collect()
}

/// Flattens one record into its points.
///
/// Returns the points and the number of coordinates dropped for having
/// fewer than two numeric components.
///
/// # Errors
///
/// Returns [`MalformedCoordinateError`] if the record's `road_coordinates`
/// cannot be parsed.
pub fn flatten_record(
    record: &CoordinateRecord,
) -> Result<(Vec<FlatPoint>, usize), MalformedCoordinateError> {
    let parsed = parse::parse_road_coordinates(&record.road_coordinates)?;

    let points = parsed
        .segments
        .iter()
        .enumerate()
        .flat_map(|(index, segment)| {
            segment
                .iter()
                .map(move |&(x, y)| FlatPoint::from_record(record, index + 1, x, y))
        })
        .collect();

    Ok((points, parsed.dropped_points))
}

/// Flattens a batch of records, appending to `report`.
///
/// Malformed records are logged, recorded in `report.warnings`, and
/// skipped.
pub fn flatten_batch(records: &[CoordinateRecord], report: &mut FlattenReport) -> Vec<FlatPoint> {
    let mut output = Vec::new();

    for record in records {
        report.records += 1;
        match flatten_record(record) {
            Ok((points, dropped)) => {
                report.points += points.len();
                report.dropped_points += dropped;
                output.extend(points);
            }
            Err(error) => {
                log::warn!("Skipping record {}: {error}", record.id);
                report.warnings.push(RecordWarning {
                    record_id: record.id.clone(),
                    error,
                });
            }
        }
    }

    output
}

/// Flattens in-memory records in batches of `batch_size`.
///
/// # Errors
///
/// Returns [`FlattenError::InvalidBatchSize`] if `batch_size` is zero.
pub fn flatten_records(
    records: &[CoordinateRecord],
    batch_size: usize,
) -> Result<(Vec<FlatPoint>, FlattenReport), FlattenError> {
    if batch_size == 0 {
        return Err(FlattenError::InvalidBatchSize);
    }

    let mut report = FlattenReport::default();
    let mut points = Vec::new();
    for batch in records.chunks(batch_size) {
        points.extend(flatten_batch(batch, &mut report));
    }

    Ok((points, report))
}

/// Streams a raw CSV through the flattener and writes the flat point CSV.
///
/// Rows are deserialized `batch_size` at a time; each batch is flattened
/// and written before the next one is read.
///
/// # Errors
///
/// Returns [`FlattenError`] if the input lacks a `road_coordinates`
/// column, `batch_size` is zero, or reading/writing the CSV fails.
/// Malformed coordinates are not errors; see [`FlattenReport::warnings`].
pub fn flatten_csv<R: Read, W: Write>(
    input: R,
    output: W,
    batch_size: usize,
    progress: &dyn ProgressCallback,
) -> Result<FlattenReport, FlattenError> {
    if batch_size == 0 {
        return Err(FlattenError::InvalidBatchSize);
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == COORDINATES_COLUMN) {
        return Err(FlattenError::MissingColumn {
            column: COORDINATES_COLUMN,
        });
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(flat_point_columns())?;

    let mut report = FlattenReport::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut batches = 0usize;

    for row in reader.records() {
        let row = conform_to_header(&row?, headers.len());
        batch.push(row.deserialize::<CoordinateRecord>(Some(&headers))?);
        if batch.len() == batch_size {
            write_batch(&mut writer, &batch, &mut report)?;
            progress.inc(batch.len() as u64);
            batch.clear();
            batches += 1;
        }
    }
    if !batch.is_empty() {
        write_batch(&mut writer, &batch, &mut report)?;
        progress.inc(batch.len() as u64);
        batches += 1;
    }

    writer.flush()?;

    log::info!(
        "Flattened {} records into {} points in {batches} batch(es); {} record(s) skipped",
        report.records,
        report.points,
        report.warnings.len()
    );
    progress.finish(format!("{} points", report.points));

    Ok(report)
}

/// Pads a ragged row with empty fields, or cuts it, to `width` fields.
///
/// A short row then reads with its missing columns empty; if that leaves
/// `road_coordinates` unparseable the record is skipped with a warning.
fn conform_to_header(row: &StringRecord, width: usize) -> StringRecord {
    if row.len() != width {
        log::debug!(
            "Row at line {} has {} fields, header has {width}",
            row.position().map_or(0, csv::Position::line),
            row.len()
        );
    }
    (0..width).map(|i| row.get(i).unwrap_or("")).collect()
}

fn write_batch<W: Write>(
    writer: &mut csv::Writer<W>,
    batch: &[CoordinateRecord],
    report: &mut FlattenReport,
) -> Result<(), FlattenError> {
    for point in flatten_batch(batch, report) {
        writer.serialize(point)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use road_gap_models::progress::NullProgress;

    use super::*;

    fn record(id: &str, coordinates: &str) -> CoordinateRecord {
        CoordinateRecord {
            id: id.to_string(),
            road_coordinates: coordinates.to_string(),
            ..CoordinateRecord::default()
        }
    }

    #[test]
    fn emits_one_point_per_pair_with_numbered_segments() {
        let records = [record("a", "[[[0,0],[1,1]],[[2,2],[3,3],[4,4]]]")];
        let (points, report) = flatten_records(&records, 10).unwrap();

        let ids: Vec<&str> = points.iter().map(|p| p.segment_id.as_str()).collect();
        assert_eq!(ids, ["a_1", "a_1", "a_2", "a_2", "a_2"]);
        assert_eq!(report.points, 5);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn segment_numbering_restarts_per_record() {
        let records = [record("a", "[[0,0],[1,1]]"), record("b", "[[5,5],[6,6]]")];
        let (points, _) = flatten_records(&records, 10).unwrap();

        assert_eq!(points[0].segment_id, "a_1");
        assert_eq!(points[2].segment_id, "b_1");
    }

    #[test]
    fn flat_and_wrapped_records_flatten_identically() {
        let flat = flatten_record(&record("r", "[[1,2],[3,4]]")).unwrap();
        let wrapped = flatten_record(&record("r", "[[[1,2],[3,4]]]")).unwrap();
        assert_eq!(flat, wrapped);
    }

    #[test]
    fn malformed_record_is_skipped_and_reported() {
        let records = [
            record("good1", "[[0,0],[1,1]]"),
            record("bad", "[[0,0],"),
            record("good2", "[[2,2],[3,3]]"),
        ];
        let (points, report) = flatten_records(&records, 10).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(report.records, 3);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].record_id, "bad");
    }

    #[test]
    fn short_coordinates_are_dropped_individually() {
        let (points, report) = flatten_records(&[record("a", "[[0,0],[1],[2,2]]")], 10).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(report.dropped_points, 1);
    }

    #[test]
    fn batch_size_does_not_change_output() {
        let records: Vec<CoordinateRecord> = (0..7)
            .map(|i| {
                let coordinates = if i == 3 {
                    "not a list".to_string()
                } else {
                    format!("[[[{i},0],[{i},1]],[[{i},2],[{i},3],[{i},4]]]")
                };
                record(&format!("r{i}"), &coordinates)
            })
            .collect();

        let (expected, expected_report) = flatten_records(&records, 1000).unwrap();
        for batch_size in [1, 2, 3, 7] {
            let (points, report) = flatten_records(&records, batch_size).unwrap();
            assert_eq!(points, expected, "batch size {batch_size}");
            assert_eq!(report, expected_report, "batch size {batch_size}");
        }
    }

    #[test]
    fn rejects_zero_batch_size() {
        assert!(matches!(
            flatten_records(&[], 0),
            Err(FlattenError::InvalidBatchSize)
        ));
    }

    #[test]
    fn flattens_csv_with_passthrough_columns() {
        let input = "id,org_code,note,road_coordinates,extra\n\
                     7,ORG1,\"hello, world\",\"[[106.8,-6.2],[106.9,-6.3]]\",ignored\n\
                     8,ORG2,,\"[[[1,2],[3,4]],[[5,6],[7,8]]]\",x\n";
        let mut output = Vec::new();
        let report = flatten_csv(input.as_bytes(), &mut output, 1, &NullProgress).unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.points, 6);

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(concat!(
                "country_id,id,grid_id,created_at,report_user_id,",
                "type,org_code,note,segment_id,x,y"
            ))
        );
        assert_eq!(
            lines.next(),
            Some(",7,,,,,ORG1,\"hello, world\",7_1,106.8,-6.2")
        );
        assert_eq!(text.lines().filter(|l| l.contains(",8_2,")).count(), 2);
    }

    #[test]
    fn ragged_rows_do_not_abort_the_file() {
        let input = "id,road_coordinates\n\
                     1,\"[[0,0],[1,1]]\"\n\
                     2,\"[[0,0],[1,1]]\",extra\n\
                     3\n\
                     4,\"[[2,2],[3,3]]\"\n";
        let mut output = Vec::new();
        let report = flatten_csv(input.as_bytes(), &mut output, 2, &NullProgress).unwrap();

        assert_eq!(report.records, 4);
        assert_eq!(report.points, 6);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].record_id, "3");

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().filter(|l| l.contains(",2_1,")).count(), 2);
        assert_eq!(text.lines().filter(|l| l.contains(",4_1,")).count(), 2);
    }

    #[test]
    fn csv_without_coordinates_column_is_rejected() {
        let mut output = Vec::new();
        let err = flatten_csv("id,note\n1,x\n".as_bytes(), &mut output, 10, &NullProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            FlattenError::MissingColumn {
                column: "road_coordinates"
            }
        ));
    }
}
