//! Allocation record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examdist_core::types::id::{AllocationRecordId, DocumentId, StudentId};

/// Durable evidence that a document was given to a student, from a
/// network address, at a point in time.
///
/// Two records are the same allocation when they share the
/// (student, document) pair; see [`AllocationRecord::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct AllocationRecord {
    /// Unique record identifier.
    pub id: AllocationRecordId,
    /// The student who received the document.
    pub student_id: StudentId,
    /// The document handed out.
    pub document_id: DocumentId,
    /// Address the request came from.
    pub ip_address: String,
    /// When the document was handed out.
    pub downloaded_at: DateTime<Utc>,
}

impl AllocationRecord {
    /// Create a new record with a random identifier.
    pub fn new(
        student_id: StudentId,
        document_id: DocumentId,
        ip_address: impl Into<String>,
        downloaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllocationRecordId::new(),
            student_id,
            document_id,
            ip_address: ip_address.into(),
            downloaded_at,
        }
    }

    /// Deduplication key.
    pub fn key(&self) -> (StudentId, DocumentId) {
        (self.student_id, self.document_id)
    }

    /// Check if this record was issued to the given address.
    pub fn issued_to_address(&self, ip_address: &str) -> bool {
        self.ip_address == ip_address
    }
}
