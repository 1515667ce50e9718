//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};

use examdist_allocation::AllocationGate;
use examdist_core::config::GateScope;
use examdist_core::types::id::{CourseId, ExamId, QuestionId, StudentId, UserId};
use examdist_database::MemoryAllocationStore;
use examdist_entity::{Course, Document, Exam, Question, Student};
use examdist_service::AllocationService;

/// Path of the demo roster, relative to the package root.
pub const DEMO_SEED: &str = "demos/seed.json";

/// One course with one exam, its questions, documents, and students.
pub struct TestExam {
    /// Backing store
    pub store: MemoryAllocationStore,
    /// The course
    pub course: Course,
    /// The exam
    pub exam: Exam,
    /// Questions in position order
    pub questions: Vec<Question>,
    /// Documents per question
    pub documents: Vec<Vec<Document>>,
    /// Enrolled students
    pub students: Vec<Student>,
}

impl TestExam {
    /// Create an exam with `documents_per_question[i]` documents for question `i`.
    pub async fn new(students: usize, documents_per_question: &[usize]) -> Self {
        Self::in_store(MemoryAllocationStore::new(), students, documents_per_question).await
    }

    /// Same as [`TestExam::new`], sharing an existing store.
    pub async fn in_store(
        store: MemoryAllocationStore,
        students: usize,
        documents_per_question: &[usize],
    ) -> Self {
        let course = Course {
            id: CourseId::new(),
            owner_id: UserId::new(),
            name: "Distributed Systems".to_string(),
        };
        store.insert_course(course.clone()).await;

        let exam = Exam {
            id: ExamId::new(),
            course_id: course.id,
            name: "Final".to_string(),
            start: Utc::now() - Duration::minutes(5),
            duration_minutes: 180,
            authentication_code: "RAFT".to_string(),
            is_limited_access: true,
        };
        store.insert_exam(exam.clone()).await.expect("exam");

        let mut questions = Vec::new();
        let mut documents = Vec::new();
        for (i, &count) in documents_per_question.iter().enumerate() {
            let question = Question {
                id: QuestionId::new(),
                exam_id: exam.id,
                description: format!("Question {}", i + 1),
                position: i as i32 + 1,
            };
            store.insert_question(question.clone()).await.expect("question");

            let mut docs = Vec::new();
            for n in 0..count {
                let doc = Document::new(
                    question.id,
                    format!("q{}-{}.pdf", i + 1, (b'a' + n as u8) as char),
                    format!("https://files.test/{}/{n}", question.id),
                );
                store.insert_document(doc.clone()).await.expect("document");
                docs.push(doc);
            }
            questions.push(question);
            documents.push(docs);
        }

        let mut enrolled = Vec::new();
        for n in 0..students {
            let student = Student {
                id: StudentId::new(),
                course_id: course.id,
                name: format!("student-{n:02}"),
                number: format!("N{n:04}"),
                email: Some(format!("student{n}@uni.test")),
            };
            store.insert_student(student.clone()).await.expect("student");
            enrolled.push(student);
        }

        Self {
            store,
            course,
            exam,
            questions,
            documents,
            students: enrolled,
        }
    }

    /// Service over this exam's store with a seeded random source.
    pub fn service(&self, scope: GateScope, seed: u64) -> AllocationService {
        AllocationService::new(
            Arc::new(self.store.clone()),
            Arc::new(AllocationGate::new(scope, None)),
        )
        .with_rng_seed(seed)
    }

    /// `ceil(students / documents)` for question `index`.
    pub fn target(&self, index: usize) -> usize {
        self.students.len().div_ceil(self.documents[index].len())
    }
}
