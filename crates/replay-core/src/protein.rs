//! Per-protein constants and pan labels.

use chrono::Duration;
use contracts::PanEventType;

use crate::normalize::CycleRecord;

const SPICY_MARKER: &str = "spicy";
const TRUNCATE_ABOVE: usize = 10;
const TRUNCATED_PREFIX: usize = 8;

/// Seconds a pan of this protein spends in a cook machine. Unknown proteins cook instantly.
pub fn cook_seconds(protein_name: &str) -> i64 {
    match protein_name {
        "filets" => 280,
        "spicy" => 280,
        "nuggets" => 180,
        "spicy strips" => 200,
        _ => 0,
    }
}

pub fn cook_duration(protein_name: &str) -> Duration {
    Duration::seconds(cook_seconds(protein_name))
}

/// Spicy pans are recognized by their pan identifier, regardless of case.
pub fn is_spicy(protein_pan: &str) -> bool {
    protein_pan.to_ascii_lowercase().contains(SPICY_MARKER)
}

/// `"<PROTEIN> <pan number>"`, with long protein names shortened when `truncate` is set.
pub fn pan_label(protein_name: &str, protein_pan: &str, truncate: bool) -> String {
    let pan_number = protein_pan.split(' ').next_back().unwrap_or_default();
    let protein = protein_name.to_uppercase();
    let protein = if truncate && protein.chars().count() > TRUNCATE_ABOVE {
        let prefix = protein.chars().take(TRUNCATED_PREFIX).collect::<String>();
        format!("{prefix}...")
    } else {
        protein
    };
    format!("{protein} {pan_number}")
}

pub fn notification_message(event_type: PanEventType, record: &CycleRecord) -> String {
    let label = pan_label(&record.protein_name, &record.protein_pan, false);
    match event_type {
        PanEventType::Start => format!("{label} scanned in"),
        PanEventType::Fill => format!("{label} finished cooking"),
        PanEventType::Cook => format!("{label} is cooking"),
        PanEventType::Stop => format!(
            "{label} scanned out {}",
            record.target_zone.scan_out_description()
        ),
    }
}
