//! Question entity model.

use serde::{Deserialize, Serialize};

use examdist_core::types::id::{ExamId, QuestionId};

/// A unit of an exam to which one or more candidate documents are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Question {
    /// Unique question identifier.
    pub id: QuestionId,
    /// The exam this question belongs to.
    pub exam_id: ExamId,
    /// Description, also used as the CSV export column header.
    pub description: String,
    /// Insertion order within the exam.
    pub position: i32,
}
