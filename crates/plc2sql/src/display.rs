//! Terminal tables for verbose acquisition output and the `check` report.

use crate::trigger::TriggerKind;
use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::collections::BTreeMap;

const RECORD_HEADERS: [&str; 6] = ["Tag", "Name", "Type", "Equipment", "Timestamp", "Value"];

/// One persisted reading, as shown in verbose mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    pub address: String,
    pub name: String,
    pub tag_type: Option<String>,
    pub equipment: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub value: String,
}

/// Render one cycle's persisted readings.
pub fn record_table(lines: &[RecordLine]) -> Table {
    let mut table = styled_table(&RECORD_HEADERS);
    for line in lines {
        table.add_row(vec![
            Cell::new(&line.address),
            Cell::new(&line.name),
            Cell::new(line.tag_type.as_deref().unwrap_or("-")),
            Cell::new(line.equipment.as_deref().unwrap_or("-")),
            Cell::new(format_timestamp(line.timestamp)),
            Cell::new(&line.value).fg(Color::Green),
        ]);
    }
    table
}

/// Render the tag count per trigger kind.
pub fn kind_count_table(counts: &BTreeMap<TriggerKind, usize>) -> Table {
    let mut table = styled_table(&["Code", "Trigger", "Tags"]);
    for (kind, count) in counts {
        table.add_row(vec![
            kind.code().to_string(),
            kind.as_str().to_string(),
            count.to_string(),
        ]);
    }
    table
}

/// Local wall-clock time with millisecond precision.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    let local: DateTime<Local> = ts.into();
    local.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect();
    table.set_header(header_cells);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_table_lists_every_line() {
        let line = RecordLine {
            address: "[plc]Line1.Running".into(),
            name: "running".into(),
            tag_type: Some("LINE RUNNING".into()),
            equipment: None,
            timestamp: Utc::now(),
            value: "1".into(),
        };
        let rendered = record_table(&[line.clone(), line]).to_string();
        assert_eq!(rendered.matches("[plc]Line1.Running").count(), 2);
        assert!(rendered.contains("LINE RUNNING"));
        assert!(rendered.contains("Equipment"));
    }

    #[test]
    fn test_kind_count_table() {
        let mut counts = BTreeMap::new();
        counts.insert(TriggerKind::Deadband, 4);
        let rendered = kind_count_table(&counts).to_string();
        assert!(rendered.contains("DEADBAND"));
        assert!(rendered.contains('4'));
    }

    #[test]
    fn test_timestamp_has_milliseconds() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert!(format_timestamp(ts).ends_with(".123"));
    }
}
