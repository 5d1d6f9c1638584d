//! Minimal comma-separated row splitter for exported cycle files. No quoting support: the
//! exports it reads never quote fields.

use replay_core::RawRow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("input has no header line")]
    MissingHeader,
}

/// Splits `text` into header-keyed rows. A trailing comma on a data line is ignored, blank
/// lines are skipped, and cells beyond the header width are dropped.
pub fn parse_csv(text: &str) -> Result<Vec<RawRow>, IngestError> {
    let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
    let header = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or(IngestError::MissingHeader)?;
    let columns = header
        .split(',')
        .map(|column| column.trim().to_string())
        .collect::<Vec<_>>();

    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let line = line.trim_end();
            let line = line.strip_suffix(',').unwrap_or(line);
            columns
                .iter()
                .zip(line.split(','))
                .map(|(column, value)| (column.clone(), value.to_string()))
                .collect::<RawRow>()
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_keyed_by_header() {
        let rows = parse_csv("protein_pan,duration\r\nNuggets 1,300,\r\n\r\nSpicy 2,120\n")
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("protein_pan").map(String::as_str), Some("Nuggets 1"));
        assert_eq!(rows[0].get("duration").map(String::as_str), Some("300"));
        assert_eq!(rows[1].get("duration").map(String::as_str), Some("120"));
    }

    #[test]
    fn short_lines_leave_columns_missing() {
        let rows = parse_csv("protein_pan,duration,breader_id\nNuggets 1,300\n").expect("rows");
        assert!(!rows[0].contains_key("breader_id"));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert_eq!(parse_csv("\n\n"), Err(IngestError::MissingHeader));
    }
}
