//! Document entity model.

use serde::{Deserialize, Serialize};

use examdist_core::types::id::{DocumentId, QuestionId};

/// One concrete file that can be handed to a student for a question.
///
/// Documents are immutable once created; the allocation engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// The question this document answers.
    pub question_id: QuestionId,
    /// File name shown to the student.
    pub public_file_name: String,
    /// Where the document content lives.
    pub url: String,
}

impl Document {
    /// Create a new document with a random identifier.
    pub fn new(
        question_id: QuestionId,
        public_file_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            question_id,
            public_file_name: public_file_name.into(),
            url: url.into(),
        }
    }
}
