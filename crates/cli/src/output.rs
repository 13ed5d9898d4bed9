//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use jasper_common::{ChangeHistoryEntry, ResultEnvelope, SimRecord};
use serde::Serialize;
use serde_json::Value;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// Print a lookup result: status line, SIM fields, then change history.
pub fn print_envelope(envelope: &ResultEnvelope, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(envelope).unwrap_or_default());
        return;
    }

    match (&envelope.error_message, envelope.success) {
        (Some(reason), _) => print_warning(&format!("Lookup failed: {reason}")),
        (None, true) => print_success("Lookup succeeded"),
        (None, false) => print_warning("SIM found, but its change history could not be read"),
    }

    if let Some(record) = &envelope.sim_basic_data {
        let mut table = new_table();
        table.set_header(vec!["Field", "Value"]);
        for (field, value) in sim_record_rows(record) {
            table.add_row(vec![field.to_string(), value]);
        }
        println!("{table}");
    }

    if let Some(history) = &envelope.sim_change_history {
        let rows: Vec<HistoryRow> = history
            .iter()
            .map(|(change_type, entry)| HistoryRow { change_type, entry })
            .collect();
        print_list(&rows, format);
    }
}

/// Field/value pairs of a SIM record, absent values shown as `-`.
pub fn sim_record_rows(record: &SimRecord) -> Vec<(&'static str, String)> {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    vec![
        ("SIM ID", record.sim_id.clone()),
        ("ICCID", show(&record.iccid)),
        ("IMEI", show(&record.imei)),
        ("Bound VIN", show(&record.bound_vin)),
        ("Brand", show(&record.brand)),
        ("Lifecycle", show(&record.lifecycle)),
        ("Session", show(&record.session_type_now)),
        ("Device type", show(&record.device_type)),
        ("Activated (UTC)", show(&record.activation_datetime)),
    ]
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    change_type: &'a str,
    #[serde(flatten)]
    entry: &'a ChangeHistoryEntry,
}

impl TableDisplay for HistoryRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Change", "From", "To", "Start (UTC)", "End (UTC)", "By"]
    }

    fn row(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        vec![
            self.change_type.to_string(),
            value_text(&self.entry.source_value),
            value_text(&self.entry.target_value),
            opt(&self.entry.start_time),
            opt(&self.entry.end_time),
            opt(&self.entry.change_by),
        ]
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sim_record_rows_show_missing_fields() {
        let record = SimRecord {
            sim_id: "1001".to_string(),
            iccid: Some("8986".to_string()),
            imei: None,
            bound_vin: None,
            brand: Some("GP".to_string()),
            lifecycle: None,
            session_type_now: None,
            device_type: None,
            activation_datetime: Some("2024-01-01 00:00:00".to_string()),
        };

        let rows = sim_record_rows(&record);
        assert_eq!(rows[0], ("SIM ID", "1001".to_string()));
        assert_eq!(rows[2], ("IMEI", "-".to_string()));
        assert_eq!(rows[8].1, "2024-01-01 00:00:00");
    }

    #[test]
    fn test_history_row() {
        let entry = ChangeHistoryEntry {
            target_value: json!("Activated"),
            source_value: json!(null),
            start_time: Some("2024-01-01 00:00:00".to_string()),
            end_time: None,
            change_by: Some("ops".to_string()),
        };
        let row = HistoryRow {
            change_type: "SIM Status",
            entry: &entry,
        };

        assert_eq!(
            row.row(),
            vec!["SIM Status", "-", "Activated", "2024-01-01 00:00:00", "-", "ops"]
        );
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["change_type"], "SIM Status");
        assert_eq!(json["target_value"], "Activated");
    }
}
