//! Who received which documents, from where, and when.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::{DocumentId, ExamId, StudentId};
use examdist_database::store::AllocationStore;

/// One student's line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Student identifier.
    pub student_id: StudentId,
    /// Student name, or the identifier if the student no longer exists.
    pub student_name: String,
    /// Address of the student's first record.
    pub ip_address: String,
    /// Time of the student's first record.
    pub downloaded_at: DateTime<Utc>,
    /// File name per question, in question order; empty when none was issued.
    pub documents: Vec<String>,
}

/// Assignment history of one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentReport {
    /// Exam identifier.
    pub exam_id: ExamId,
    /// Exam name.
    pub exam_name: String,
    /// Question descriptions in question order.
    pub questions: Vec<String>,
    /// Rows in order of each student's first record.
    pub rows: Vec<AssignmentRow>,
}

impl AssignmentReport {
    /// Build the report for `exam_id` from the store.
    pub async fn for_exam<S>(store: &S, exam_id: ExamId) -> AppResult<Self>
    where
        S: AllocationStore + ?Sized,
    {
        let exam = store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exam {exam_id} not found")))?;

        let questions = store.questions_for_exam(exam_id).await?;
        let mut placement: HashMap<DocumentId, (usize, String)> = HashMap::new();
        for (index, question) in questions.iter().enumerate() {
            for document in store.documents_for_question(question.id).await? {
                placement.insert(document.id, (index, document.public_file_name));
            }
        }

        let mut records = store.allocation_records_for_exam(exam_id).await?;
        records.sort_by_key(|r| r.downloaded_at);

        let mut rows: Vec<AssignmentRow> = Vec::new();
        let mut row_of: HashMap<StudentId, usize> = HashMap::new();
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.key()) {
                continue;
            }
            let Some((column, file_name)) = placement.get(&record.document_id) else {
                continue;
            };

            let row = match row_of.get(&record.student_id) {
                Some(&row) => row,
                None => {
                    let student_name = store
                        .find_student(record.student_id)
                        .await?
                        .map(|s| s.name)
                        .unwrap_or_else(|| record.student_id.to_string());
                    rows.push(AssignmentRow {
                        student_id: record.student_id,
                        student_name,
                        ip_address: record.ip_address.clone(),
                        downloaded_at: record.downloaded_at,
                        documents: vec![String::new(); questions.len()],
                    });
                    row_of.insert(record.student_id, rows.len() - 1);
                    rows.len() - 1
                }
            };

            let cell = &mut rows[row].documents[*column];
            if cell.is_empty() {
                cell.clone_from(file_name);
            }
        }

        Ok(Self {
            exam_id,
            exam_name: exam.name,
            questions: questions.into_iter().map(|q| q.description).collect(),
            rows,
        })
    }
}
