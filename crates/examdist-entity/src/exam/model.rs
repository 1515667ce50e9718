//! Exam entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use examdist_core::types::id::{CourseId, ExamId};

/// An exam of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Exam {
    /// Unique exam identifier.
    pub id: ExamId,
    /// The course this exam belongs to.
    pub course_id: CourseId,
    /// Exam name.
    pub name: String,
    /// When the exam opens.
    pub start: DateTime<Utc>,
    /// How long the exam stays open.
    pub duration_minutes: i32,
    /// Code students must present to request documents.
    #[serde(skip_serializing, default)]
    pub authentication_code: String,
    /// Whether requests are only accepted inside the exam window.
    #[serde(default)]
    pub is_limited_access: bool,
}

impl Exam {
    /// When the exam window closes.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Check whether requests are accepted at `now`.
    ///
    /// Exams without limited access are always open.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_limited_access || (self.start <= now && now <= self.ends_at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(limited: bool) -> Exam {
        Exam {
            id: ExamId::new(),
            course_id: CourseId::new(),
            name: "Midterm".to_string(),
            start: DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
                .expect("valid timestamp")
                .with_timezone(&Utc),
            duration_minutes: 90,
            authentication_code: "ABC".to_string(),
            is_limited_access: limited,
        }
    }

    #[test]
    fn test_unlimited_exam_is_always_open() {
        let e = exam(false);
        assert!(e.is_open_at(e.start - Duration::days(3)));
        assert!(e.is_open_at(e.ends_at() + Duration::days(3)));
    }

    #[test]
    fn test_limited_exam_window_is_inclusive() {
        let e = exam(true);
        assert!(!e.is_open_at(e.start - Duration::seconds(1)));
        assert!(e.is_open_at(e.start));
        assert!(e.is_open_at(e.ends_at()));
        assert!(!e.is_open_at(e.ends_at() + Duration::seconds(1)));
    }

    #[test]
    fn test_authentication_code_is_not_serialized() {
        let json = serde_json::to_value(exam(true)).expect("serialize");
        assert!(json.get("authentication_code").is_none());
    }
}
