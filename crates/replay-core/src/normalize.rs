//! Cycle normalization: exact-row dedup, typed conversion, and start-time ordering.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use contracts::TargetZone;

use crate::error::{ReplayError, Result};

/// One parsed CSV row, column name to raw cell text.
pub type RawRow = BTreeMap<String, String>;

pub const COLUMN_LOCATION_ID: &str = "location_id";
pub const COLUMN_START: &str = "start_timestamp";
pub const COLUMN_STOP: &str = "stop_timestamp";
pub const COLUMN_PROTEIN_NAME: &str = "protein_name";
pub const COLUMN_PROTEIN_PAN: &str = "protein_pan";
pub const COLUMN_DURATION: &str = "duration";
pub const COLUMN_LONG_CYCLE: &str = "is_long_cycle_error";
pub const COLUMN_SHORT_CYCLE: &str = "is_short_cycle_error";
pub const COLUMN_MISSED_CHECKOUT: &str = "is_missed_checkout_error";
pub const COLUMN_TARGET_ZONE: &str = "tzi_target_zone";
pub const COLUMN_BREADER_ID: &str = "breader_id";

const RECOGNIZED_COLUMN_COUNT: usize = 11;

pub const RECOGNIZED_COLUMNS: [&str; RECOGNIZED_COLUMN_COUNT] = [
    COLUMN_LOCATION_ID,
    COLUMN_START,
    COLUMN_STOP,
    COLUMN_PROTEIN_NAME,
    COLUMN_PROTEIN_PAN,
    COLUMN_DURATION,
    COLUMN_LONG_CYCLE,
    COLUMN_SHORT_CYCLE,
    COLUMN_MISSED_CHECKOUT,
    COLUMN_TARGET_ZONE,
    COLUMN_BREADER_ID,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycleRecord {
    pub protein_name: String,
    pub protein_pan: String,
    pub duration: i64,
    pub start_timestamp: DateTime<Utc>,
    pub stop_timestamp: DateTime<Utc>,
    pub is_long_cycle_error: bool,
    pub is_short_cycle_error: bool,
    pub is_missed_checkout_error: bool,
    pub target_zone: TargetZone,
    pub breader_id: String,
}

/// Immutable per-load input to the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDataset {
    pub location_id: String,
    pub date: DateTime<Utc>,
    pub records: Vec<CycleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub row_index: usize,
    pub column: &'static str,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    pub dataset: ReplayDataset,
    pub total_rows: usize,
    pub duplicate_rows: usize,
    pub skipped: Vec<RowIssue>,
}

type RowKey<'a> = [Option<&'a str>; RECOGNIZED_COLUMN_COUNT];

fn row_key(row: &RawRow) -> RowKey<'_> {
    RECOGNIZED_COLUMNS.map(|column| cell(row, column))
}

/// Drops duplicate rows, converts the survivors, and sorts them by start time.
///
/// Two rows are duplicates when every recognized column holds the same trimmed text; columns
/// the simulation never reads do not keep otherwise identical rows apart.
pub fn normalize_rows(rows: &[RawRow]) -> Result<NormalizeReport> {
    let mut seen = HashSet::<RowKey<'_>>::with_capacity(rows.len());
    let mut duplicate_rows = 0_usize;
    let mut skipped = Vec::new();
    let mut location_id = None::<String>;
    let mut records = Vec::with_capacity(rows.len());

    for (row_index, row) in rows.iter().enumerate() {
        if !seen.insert(row_key(row)) {
            duplicate_rows += 1;
            continue;
        }

        match parse_record(row_index, row) {
            Ok(record) => {
                if location_id.is_none() {
                    let id = cell(row, COLUMN_LOCATION_ID).unwrap_or_default();
                    location_id = Some(id.to_string());
                }
                records.push(record);
            }
            Err(issue) => {
                tracing::warn!(
                    row = issue.row_index,
                    column = issue.column,
                    value = ?issue.value,
                    "skipping unparseable cycle row"
                );
                skipped.push(issue);
            }
        }
    }

    if records.is_empty() {
        return Err(ReplayError::NoData {
            total_rows: rows.len(),
            skipped_rows: skipped.len(),
        });
    }

    let date = records[0].start_timestamp;
    records.sort_by_key(|record| record.start_timestamp);

    Ok(NormalizeReport {
        dataset: ReplayDataset {
            location_id: location_id.unwrap_or_default(),
            date,
            records,
        },
        total_rows: rows.len(),
        duplicate_rows,
        skipped,
    })
}

fn cell<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.get(column).map(|value| value.trim())
}

fn parse_record(row_index: usize, row: &RawRow) -> std::result::Result<CycleRecord, RowIssue> {
    let issue = |column: &'static str| RowIssue {
        row_index,
        column,
        value: row.get(column).cloned(),
    };

    let protein_pan = cell(row, COLUMN_PROTEIN_PAN)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| issue(COLUMN_PROTEIN_PAN))?;
    let start_timestamp = cell(row, COLUMN_START)
        .and_then(parse_timestamp)
        .ok_or_else(|| issue(COLUMN_START))?;
    let stop_timestamp = cell(row, COLUMN_STOP)
        .and_then(parse_timestamp)
        .ok_or_else(|| issue(COLUMN_STOP))?;
    let duration = cell(row, COLUMN_DURATION)
        .and_then(parse_integer)
        .ok_or_else(|| issue(COLUMN_DURATION))?;
    let target_zone = cell(row, COLUMN_TARGET_ZONE)
        .and_then(parse_integer)
        .map(TargetZone::from_code)
        .unwrap_or_default();

    Ok(CycleRecord {
        protein_name: cell(row, COLUMN_PROTEIN_NAME).unwrap_or_default().to_string(),
        protein_pan: protein_pan.to_string(),
        duration,
        start_timestamp,
        stop_timestamp,
        is_long_cycle_error: parse_flag(cell(row, COLUMN_LONG_CYCLE)),
        is_short_cycle_error: parse_flag(cell(row, COLUMN_SHORT_CYCLE)),
        is_missed_checkout_error: parse_flag(cell(row, COLUMN_MISSED_CHECKOUT)),
        target_zone,
        breader_id: cell(row, COLUMN_BREADER_ID).unwrap_or_default().to_string(),
    })
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    })
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f %#z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Accepts RFC 3339, space-separated timestamps with or without an offset, and US-style
/// dates. Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(" UTC").unwrap_or(raw);

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}
