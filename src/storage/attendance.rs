use crate::common::{FaceRollError, Result};
use crate::storage::database::{page_offset, violated_constraint, Constraint, Database};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

/// One recognition event written to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEvent {
    pub event_id: String,
    pub identity_id: String,
    pub evidence_frame_path: String,
    pub occurred_at: DateTime<Utc>,
}

impl AttendanceEvent {
    /// New event with a random id, stamped now.
    pub fn new(identity_id: impl Into<String>, evidence_frame_path: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            identity_id: identity_id.into(),
            evidence_frame_path: evidence_frame_path.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// An event joined with the display name of the identity it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEntry {
    pub event: AttendanceEvent,
    pub display_name: String,
}

/// Append-only ledger of attendance events. Safe to share across threads.
#[derive(Clone)]
pub struct AttendanceLedger {
    db: Database,
}

// Fixed-width UTC timestamps sort lexically in chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: Option<String>, event_id: &str) -> Result<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| {
        FaceRollError::StoreUnavailable(format!("Attendance event {} has no timestamp", event_id))
    })?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            FaceRollError::StoreUnavailable(format!(
                "Attendance event {} has a bad timestamp '{}': {}", event_id, raw, e
            ))
        })
}

type EventRow = (String, String, String, Option<String>, String);

impl AttendanceLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends `event`. Integrity is checked by the insert itself.
    pub fn record(&self, event: &AttendanceEvent) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO attendance (event_id, identity_id, evidence_frame_path, occurred_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.event_id,
                event.identity_id,
                event.evidence_frame_path,
                format_timestamp(&event.occurred_at)
            ],
        )
        .map_err(|e| match violated_constraint(&e) {
            Some(Constraint::Key) => {
                tracing::warn!("Failed to record attendance. Event ID '{}' already exists.", event.event_id);
                FaceRollError::DuplicateId(event.event_id.clone())
            }
            Some(Constraint::ForeignKey) => {
                tracing::warn!("Failed to record attendance. Identity '{}' does not exist.", event.identity_id);
                FaceRollError::UnknownIdentity(event.identity_id.clone())
            }
            None => e.into(),
        })?;

        tracing::info!("Recorded attendance for identity: {}", event.identity_id);
        Ok(())
    }

    /// Events newest first.
    pub fn list(&self, page: u32, page_size: u32) -> Result<Vec<AttendanceEvent>> {
        Ok(self
            .list_entries(page, page_size)?
            .into_iter()
            .map(|entry| entry.event)
            .collect())
    }

    /// Events newest first, with the display name of each identity.
    pub fn list_entries(&self, page: u32, page_size: u32) -> Result<Vec<AttendanceEntry>> {
        let (limit, offset) = page_offset(page, page_size)?;

        let rows: Vec<EventRow> = {
            let conn = self.db.lock()?;
            let mut stmt = conn.prepare(
                "SELECT a.event_id, a.identity_id, a.evidence_frame_path, a.occurred_at, i.display_name
                 FROM attendance a JOIN identities i ON i.identity_id = a.identity_id
                 ORDER BY a.occurred_at DESC, a.rowid DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(params![limit, offset], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|(event_id, identity_id, evidence_frame_path, occurred_at, display_name)| {
                let occurred_at = parse_timestamp(occurred_at, &event_id)?;
                Ok(AttendanceEntry {
                    event: AttendanceEvent {
                        event_id,
                        identity_id,
                        evidence_frame_path,
                        occurred_at,
                    },
                    display_name,
                })
            })
            .collect()
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
