//! Types shared between the database and API representations.

pub mod announcement;
pub mod contest;
pub mod role;
