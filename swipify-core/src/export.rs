use std::path::Path;

use chrono::SecondsFormat;

use crate::ledger::Ledger;

pub const CSV_HEADER: &str = "item_id,decision,timestamp";

/// Ledger as CSV, one row per decided item, oldest first.
pub fn decisions_csv(ledger: &Ledger) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (id, outcome) in ledger.chronological() {
        out.push_str(&csv_field(id));
        out.push(',');
        out.push_str(outcome.decision.as_str());
        out.push(',');
        out.push_str(&outcome.at.to_rfc3339_opts(SecondsFormat::Secs, true));
        out.push('\n');
    }
    out
}

/// Write [`decisions_csv`] to `path`. Returns the number of rows written.
pub fn write_decisions_csv(path: &Path, ledger: &Ledger) -> std::io::Result<usize> {
    std::fs::write(path, decisions_csv(ledger))?;
    Ok(ledger.len())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
