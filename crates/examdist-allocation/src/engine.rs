//! The allocation decision: one document per question, weighted by
//! remaining fair-share capacity and steered away from documents already
//! handed to the same network address.
//!
//! For a question with `k` candidates in a class of `n` students every
//! document has a target of `ceil(n / k)` hand-outs. A document's weight
//! is its target minus the records already issued for it; documents
//! already issued to the requester's address get weight zero unless that
//! leaves nothing to draw from, in which case the unfiltered weights are
//! used. The draw is uniform over the resulting weighted pool.

use rand::Rng;
use tracing::{debug, warn};

use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::QuestionId;
use examdist_entity::Document;

use crate::snapshot::{AllocationSnapshot, QuestionCandidates};

/// Capacity weights computed for one question, before drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityPlan {
    /// The question the plan is for.
    pub question_id: QuestionId,
    /// Fair-share target repeat count, identical for every candidate.
    pub target: i64,
    /// Target minus issued records, per candidate. May be negative.
    pub remaining: Vec<i64>,
    /// `remaining`, zeroed for candidates already issued to the requester's
    /// address.
    pub address_filtered: Vec<i64>,
    /// Whether the address filter left nothing and `remaining` is used instead.
    pub used_fallback: bool,
}

impl CapacityPlan {
    /// Compute the plan for one question's candidates.
    pub fn compute(
        candidates: &QuestionCandidates,
        student_count: u64,
        ip_address: &str,
    ) -> Self {
        let documents = candidates.documents();
        let target = target_repeat_count(student_count, documents.len());

        let mut remaining = Vec::with_capacity(documents.len());
        let mut address_filtered = Vec::with_capacity(documents.len());
        for document in documents {
            let records = candidates.records_for(document.id);
            let left = target - records.len() as i64;
            remaining.push(left);

            if records.iter().any(|r| r.issued_to_address(ip_address)) {
                address_filtered.push(0);
            } else {
                address_filtered.push(left);
            }
        }

        let used_fallback = pool_size(&address_filtered) == 0;

        Self {
            question_id: candidates.question_id(),
            target,
            remaining,
            address_filtered,
            used_fallback,
        }
    }

    /// The weights the draw uses.
    pub fn weights(&self) -> &[i64] {
        if self.used_fallback {
            &self.remaining
        } else {
            &self.address_filtered
        }
    }

    /// Number of entries in the weighted pool.
    pub fn pool_size(&self) -> u64 {
        pool_size(self.weights())
    }

    /// Draw a candidate index uniformly from the weighted pool.
    ///
    /// Returns `None` when the pool is empty.
    pub fn draw<R>(&self, rng: &mut R) -> Option<usize>
    where
        R: Rng + ?Sized,
    {
        let size = self.pool_size();
        if size == 0 {
            return None;
        }

        // Position in the pool where each candidate is repeated `weight` times.
        let mut position = rng.random_range(0..size);
        for (index, &weight) in self.weights().iter().enumerate() {
            let weight = weight.max(0) as u64;
            if position < weight {
                return Some(index);
            }
            position -= weight;
        }
        None
    }
}

/// `ceil(student_count / document_count)`; zero students gives zero.
fn target_repeat_count(student_count: u64, document_count: usize) -> i64 {
    if document_count == 0 {
        return 0;
    }
    student_count.div_ceil(document_count as u64) as i64
}

/// Only positive weights contribute to the pool.
fn pool_size(weights: &[i64]) -> u64 {
    weights.iter().filter(|&&w| w > 0).map(|&w| w as u64).sum()
}

/// Stateless allocation decision function.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine;

impl AllocationEngine {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }

    /// Capacity plans for every question with at least one candidate.
    pub fn plan(
        &self,
        snapshot: &AllocationSnapshot,
        ip_address: &str,
    ) -> AppResult<Vec<CapacityPlan>> {
        snapshot.validate()?;
        Ok(snapshot
            .questions()
            .iter()
            .filter(|c| !c.documents().is_empty())
            .map(|c| CapacityPlan::compute(c, snapshot.student_count(), ip_address))
            .collect())
    }

    /// Pick one document per question for a requester at `ip_address`.
    ///
    /// Fails with `AllocationExhausted` if any question has nothing left to
    /// hand out, and with `InvalidSnapshot` if the snapshot is inconsistent.
    /// Either way nothing is returned for the other questions.
    pub fn decide<R>(
        &self,
        snapshot: &AllocationSnapshot,
        ip_address: &str,
        rng: &mut R,
    ) -> AppResult<Vec<Document>>
    where
        R: Rng + ?Sized,
    {
        debug!(
            taken_at = %snapshot.taken_at(),
            student_count = snapshot.student_count(),
            questions = snapshot.questions().len(),
            ip_address,
            "Deciding allocation"
        );
        let plans = self.plan(snapshot, ip_address)?;
        let candidates = snapshot
            .questions()
            .iter()
            .filter(|c| !c.documents().is_empty());

        let mut assignments = Vec::with_capacity(plans.len());
        for (plan, candidates) in plans.iter().zip(candidates) {
            if plan.used_fallback {
                debug!(
                    question_id = %plan.question_id,
                    ip_address,
                    "Every candidate already issued to this address, using unfiltered capacity"
                );
            }

            let Some(index) = plan.draw(rng) else {
                warn!(
                    question_id = %plan.question_id,
                    student_count = snapshot.student_count(),
                    candidates = candidates.documents().len(),
                    target = plan.target,
                    "No capacity left for question"
                );
                return Err(AppError::allocation_exhausted(format!(
                    "No document of question {} has capacity left ({} students, {} documents)",
                    plan.question_id,
                    snapshot.student_count(),
                    candidates.documents().len()
                )));
            };

            debug!(
                question_id = %plan.question_id,
                pool = plan.pool_size(),
                weights = ?plan.weights(),
                picked = index,
                "Question allocated"
            );
            assignments.push(candidates.documents()[index].clone());
        }

        Ok(assignments)
    }
}
