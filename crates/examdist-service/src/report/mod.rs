//! Per-exam assignment history and CSV export.

pub mod csv;
pub mod history;

pub use history::{AssignmentReport, AssignmentRow};
