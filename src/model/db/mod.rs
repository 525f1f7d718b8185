//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - `New*` types lack the `_id` field, which the database assigns.

pub mod announcement;
pub mod ballot;
pub mod candidate;
pub mod contest;
pub mod member;
