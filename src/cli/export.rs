use crate::common::Result;
use crate::storage::AttendanceLedger;
use chrono::SecondsFormat;
use std::io::Write;

const EXPORT_PAGE_SIZE: u32 = 500;
const HEADER: [&str; 5] = ["event_id", "identity_id", "display_name", "evidence_frame_path", "occurred_at"];

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> Result<()> {
    let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    writeln!(out, "{}", row.join(","))?;
    Ok(())
}

/// Writes the whole ledger as fully quoted CSV, newest event first.
/// Returns the number of events written.
pub fn write_attendance_csv<W: Write>(ledger: &AttendanceLedger, out: &mut W) -> Result<usize> {
    write_row(out, &HEADER)?;

    let mut written = 0;
    let mut page = 1;
    loop {
        let entries = ledger.list_entries(page, EXPORT_PAGE_SIZE)?;
        if entries.is_empty() {
            break;
        }
        for entry in &entries {
            let occurred_at = entry.event.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true);
            write_row(out, &[
                entry.event.event_id.as_str(),
                entry.event.identity_id.as_str(),
                entry.display_name.as_str(),
                entry.event.evidence_frame_path.as_str(),
                occurred_at.as_str(),
            ])?;
        }
        written += entries.len();
        page += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StoreConfig;
    use crate::core::EMBEDDING_DIM;
    use crate::storage::{AttendanceEvent, Database, Identity, IdentityStore};

    #[test]
    fn exports_quoted_rows() {
        let db = Database::open_in_memory().unwrap();
        let store = IdentityStore::new(db.clone(), &StoreConfig::default());
        store
            .enroll(&Identity {
                identity_id: "S01".into(),
                display_name: "Grace \"Amazing\" Hopper".into(),
                reference_image_path: String::new(),
                embedding: vec![1.0; EMBEDDING_DIM],
            })
            .unwrap();
        let ledger = AttendanceLedger::new(db);
        let mut event = AttendanceEvent::new("S01", "/frames/1.jpg");
        event.event_id = "E1".into();
        ledger.record(&event).unwrap();

        let mut out = Vec::new();
        assert_eq!(write_attendance_csv(&ledger, &mut out).unwrap(), 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "\"event_id\",\"identity_id\",\"display_name\",\"evidence_frame_path\",\"occurred_at\""
        );
        assert!(lines[1].starts_with("\"E1\",\"S01\",\"Grace \"\"Amazing\"\" Hopper\",\"/frames/1.jpg\",\""));
    }

    #[test]
    fn empty_ledger_exports_header_only() {
        let ledger = AttendanceLedger::new(Database::open_in_memory().unwrap());
        let mut out = Vec::new();
        assert_eq!(write_attendance_csv(&ledger, &mut out).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
