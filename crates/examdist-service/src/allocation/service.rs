//! Allocation service: hands every student one document per question.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use dashmap::DashMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use examdist_allocation::{AllocationEngine, AllocationGate, AllocationSnapshot};
use examdist_core::config::AllocationConfig;
use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::{ExamId, StudentId};
use examdist_database::store::AllocationStore;
use examdist_entity::{Document, Exam, Student};

use crate::access::{AccessGuard, AssignRequest};
use crate::notification::{AllocatedMessage, AllocationNotifier};

/// Documents delivered for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    /// One document per question, in question order.
    pub documents: Vec<Document>,
    /// `true` when the documents were allocated by an earlier request.
    pub redelivered: bool,
}

/// Orchestrates allocation requests against a store.
///
/// The read-decide-persist sequence runs inside the [`AllocationGate`], so
/// concurrent requests never decide on the same snapshot.
#[derive(Debug)]
pub struct AllocationService {
    store: Arc<dyn AllocationStore>,
    gate: Arc<AllocationGate>,
    guard: AccessGuard,
    engine: AllocationEngine,
    rng: Mutex<StdRng>,
    notifier: Option<Arc<dyn AllocationNotifier>>,
    /// Deliveries per (student, exam) since the service started.
    deliveries: DashMap<(StudentId, ExamId), u32>,
}

impl AllocationService {
    /// Creates a service with an OS-seeded random source and no notifier.
    pub fn new(store: Arc<dyn AllocationStore>, gate: Arc<AllocationGate>) -> Self {
        Self {
            guard: AccessGuard::new(Arc::clone(&store)),
            store,
            gate,
            engine: AllocationEngine::new(),
            rng: Mutex::new(StdRng::from_os_rng()),
            notifier: None,
            deliveries: DashMap::new(),
        }
    }

    /// Creates a service from the `[allocation]` section.
    pub fn from_config(store: Arc<dyn AllocationStore>, config: &AllocationConfig) -> Self {
        let service = Self::new(store, Arc::new(AllocationGate::from_config(config)));
        match config.rng_seed {
            Some(seed) => service.with_rng_seed(seed),
            None => service,
        }
    }

    /// Use a fixed seed for the random source.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Send an [`AllocatedMessage`] to the course owner after each delivery.
    pub fn with_notifier(mut self, notifier: Arc<dyn AllocationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The gate guarding allocations.
    pub fn gate(&self) -> &Arc<AllocationGate> {
        &self.gate
    }

    /// How many times the student has received this exam's documents.
    pub fn deliveries(&self, student_id: StudentId, exam_id: ExamId) -> u32 {
        self.deliveries
            .get(&(student_id, exam_id))
            .map(|n| *n)
            .unwrap_or(0)
    }

    /// Verify a student's request and deliver their documents.
    pub async fn request_documents(
        &self,
        request: &AssignRequest,
        ip_address: &str,
    ) -> AppResult<AllocationOutcome> {
        let (exam, student) = self.guard.verify(request, Utc::now()).await?;
        self.deliver(&exam, &student, ip_address).await
    }

    /// Deliver one document per question of `exam_id` to `student_id`.
    ///
    /// A student who already holds documents for the exam gets the same
    /// documents back and no new records are written.
    pub async fn allocate(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
        ip_address: &str,
    ) -> AppResult<AllocationOutcome> {
        let exam = self
            .store
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Exam {exam_id} not found")))?;
        let student = self
            .store
            .find_student(student_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Student {student_id} not found")))?;

        self.deliver(&exam, &student, ip_address).await
    }

    async fn deliver(
        &self,
        exam: &Exam,
        student: &Student,
        ip_address: &str,
    ) -> AppResult<AllocationOutcome> {
        let outcome = match self.existing(exam, student).await? {
            Some(outcome) => outcome,
            None => {
                self.gate
                    .with_exclusive_access(exam.id, || {
                        self.allocate_exclusive(exam, student, ip_address)
                    })
                    .await?
            }
        };

        if !outcome.documents.is_empty() {
            self.after_delivery(exam, student, &outcome).await;
        }
        Ok(outcome)
    }

    async fn existing(
        &self,
        exam: &Exam,
        student: &Student,
    ) -> AppResult<Option<AllocationOutcome>> {
        if !self.store.has_any_allocation(student.id, exam.id).await? {
            return Ok(None);
        }

        let documents = self.store.existing_documents_for(student.id, exam.id).await?;
        debug!(
            student_id = %student.id,
            exam_id = %exam.id,
            documents = documents.len(),
            "Redelivering existing allocation"
        );
        Ok(Some(AllocationOutcome {
            documents,
            redelivered: true,
        }))
    }

    /// Runs while holding the gate.
    async fn allocate_exclusive(
        &self,
        exam: &Exam,
        student: &Student,
        ip_address: &str,
    ) -> AppResult<AllocationOutcome> {
        // A concurrent request from the same student may have committed while we waited.
        if let Some(outcome) = self.existing(exam, student).await? {
            return Ok(outcome);
        }

        let snapshot =
            AllocationSnapshot::collect(self.store.as_ref(), exam.course_id, exam.id).await?;
        let documents = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.engine.decide(&snapshot, ip_address, &mut *rng)?
        };

        if documents.is_empty() {
            warn!(exam_id = %exam.id, "Exam has no documents to allocate");
            return Ok(AllocationOutcome {
                documents,
                redelivered: false,
            });
        }

        self.store
            .persist_allocations(student.id, ip_address, Utc::now(), &documents)
            .await?;

        info!(
            student_id = %student.id,
            exam_id = %exam.id,
            ip_address,
            documents = documents.len(),
            "Documents allocated"
        );
        Ok(AllocationOutcome {
            documents,
            redelivered: false,
        })
    }

    /// Records are committed by now; nothing here may fail the request.
    async fn after_delivery(&self, exam: &Exam, student: &Student, outcome: &AllocationOutcome) {
        let num_downloads = {
            let mut count = self.deliveries.entry((student.id, exam.id)).or_insert(0);
            *count += 1;
            *count
        };

        let Some(notifier) = &self.notifier else {
            return;
        };

        let course = match self.store.find_course(exam.course_id).await {
            Ok(Some(course)) => course,
            Ok(None) => {
                warn!(course_id = %exam.course_id, "Course missing, owner not notified");
                return;
            }
            Err(e) => {
                warn!(
                    course_id = %exam.course_id,
                    error = %e,
                    "Failed to load course, owner not notified"
                );
                return;
            }
        };

        let message =
            AllocatedMessage::new(&course, exam, student, &outcome.documents, num_downloads);
        if let Err(e) = notifier.documents_allocated(course.owner_id, message).await {
            warn!(
                owner = %course.owner_id,
                exam_id = %exam.id,
                error = %e,
                "Failed to notify course owner"
            );
        }
    }
}
