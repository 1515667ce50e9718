//! Point-in-time allocation state used as engine input.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::{CourseId, DocumentId, ExamId, QuestionId};
use examdist_database::store::AllocationStore;
use examdist_entity::{AllocationRecord, Document};

/// Candidate documents of one question and the records already issued against them.
#[derive(Debug, Clone)]
pub struct QuestionCandidates {
    question_id: QuestionId,
    documents: Vec<Document>,
    records: HashMap<DocumentId, Vec<AllocationRecord>>,
}

impl QuestionCandidates {
    /// Candidates without any issued records.
    pub fn new(question_id: QuestionId, documents: Vec<Document>) -> Self {
        Self {
            question_id,
            documents,
            records: HashMap::new(),
        }
    }

    /// Attach the records already issued for one document.
    pub fn with_records(mut self, document_id: DocumentId, records: Vec<AllocationRecord>) -> Self {
        self.records.entry(document_id).or_default().extend(records);
        self
    }

    /// The question these candidates belong to.
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    /// Candidate documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Records already issued for a document (empty if none).
    pub fn records_for(&self, document_id: DocumentId) -> &[AllocationRecord] {
        self.records
            .get(&document_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn validate(&self) -> AppResult<()> {
        let mut ids = HashSet::with_capacity(self.documents.len());
        for document in &self.documents {
            if document.question_id != self.question_id {
                return Err(AppError::invalid_snapshot(format!(
                    "Document {} belongs to question {}, listed under {}",
                    document.id, document.question_id, self.question_id
                )));
            }
            if !ids.insert(document.id) {
                return Err(AppError::invalid_snapshot(format!(
                    "Document {} is listed twice for question {}",
                    document.id, self.question_id
                )));
            }
        }

        for (document_id, records) in &self.records {
            if !ids.contains(document_id) {
                return Err(AppError::invalid_snapshot(format!(
                    "Records reference document {document_id}, \
                     which is not a candidate of question {}",
                    self.question_id
                )));
            }
            if let Some(stray) = records.iter().find(|r| r.document_id != *document_id) {
                return Err(AppError::invalid_snapshot(format!(
                    "Record {} for document {} filed under document {document_id}",
                    stray.id, stray.document_id
                )));
            }
        }
        Ok(())
    }
}

/// Immutable view of everything one allocation decision needs.
///
/// Built fresh for every decision and never shared between concurrent
/// decisions.
#[derive(Debug, Clone)]
pub struct AllocationSnapshot {
    student_count: u64,
    questions: Vec<QuestionCandidates>,
    taken_at: DateTime<Utc>,
}

impl AllocationSnapshot {
    /// An empty snapshot for a class of `student_count` students.
    pub fn new(student_count: u64) -> Self {
        Self {
            student_count,
            questions: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    /// Append one question's candidates.
    pub fn with_question(mut self, candidates: QuestionCandidates) -> Self {
        self.questions.push(candidates);
        self
    }

    /// Number of students enrolled in the course.
    pub fn student_count(&self) -> u64 {
        self.student_count
    }

    /// Per-question candidates in question order.
    pub fn questions(&self) -> &[QuestionCandidates] {
        &self.questions
    }

    /// When the snapshot was read.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Check structural consistency between documents and records.
    pub fn validate(&self) -> AppResult<()> {
        self.questions.iter().try_for_each(QuestionCandidates::validate)
    }

    /// Read a fresh snapshot of an exam from the store.
    ///
    /// Questions without documents are left out.
    pub async fn collect<S>(store: &S, course_id: CourseId, exam_id: ExamId) -> AppResult<Self>
    where
        S: AllocationStore + ?Sized,
    {
        let mut snapshot = Self::new(store.count_students_in_course(course_id).await?);

        for question in store.questions_for_exam(exam_id).await? {
            let documents = store.documents_for_question(question.id).await?;
            if documents.is_empty() {
                continue;
            }

            let mut records = HashMap::with_capacity(documents.len());
            for document in &documents {
                records.insert(
                    document.id,
                    store.allocation_records_for_document(document.id).await?,
                );
            }

            snapshot.questions.push(QuestionCandidates {
                question_id: question.id,
                documents,
                records,
            });
        }

        Ok(snapshot)
    }
}
