pub mod attendance;
pub mod database;
pub mod identity_store;

pub use attendance::{AttendanceEntry, AttendanceEvent, AttendanceLedger};
pub use database::Database;
pub use identity_store::{Identity, IdentityStore, IdentitySummary, OrderBy, SimilarIdentity};
