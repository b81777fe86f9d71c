//! Lesson progress tracking and the per-student mastery overview.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use edura_store::{LessonProgress, LessonStatus, User};

use crate::error::{EngineError, Result};
use crate::Platform;

/// Folds a progress report into the (student, lesson) record.
///
/// The reported percentage is clamped to [0, 100]. Reaching 100 flips the
/// status to `Completed` and stamps `completed_at` exactly once; later
/// reports never unset it or move it.
#[must_use]
pub fn apply_progress(
    existing: Option<LessonProgress>,
    student_id: Uuid,
    lesson_id: Uuid,
    reported_percent: f64,
    now: DateTime<Utc>,
) -> LessonProgress {
    let percent = reported_percent.clamp(0.0, 100.0);
    let completed = percent >= 100.0;
    let status = if completed {
        LessonStatus::Completed
    } else {
        LessonStatus::InProgress
    };

    match existing {
        Some(mut progress) => {
            progress.progress_percent = percent;
            progress.status = status;
            progress.last_accessed_at = now;
            if completed && progress.completed_at.is_none() {
                progress.completed_at = Some(now);
            }
            progress
        }
        None => LessonProgress {
            lesson_id,
            student_id,
            status,
            progress_percent: percent,
            started_at: now,
            last_accessed_at: now,
            completed_at: completed.then_some(now),
        },
    }
}

/// One topic row in the mastery overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    /// The topic.
    pub topic_id: Uuid,
    /// Display title.
    pub title: String,
    /// Position within the subject.
    pub order_num: i32,
    /// Latest score, 0 when never tested.
    pub mastery_level: f64,
    /// Attempts so far, 0 when never tested.
    pub attempts_count: u32,
    /// When the topic was last tested.
    pub last_tested_at: Option<DateTime<Utc>>,
}

/// One subject in the mastery overview, topics in curriculum order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    /// The subject.
    pub subject_id: Uuid,
    /// Display name.
    pub name: String,
    /// Topics ordered by `order_num`.
    pub topics: Vec<TopicProgress>,
}

impl Platform {
    /// Records a progress report for a student's lesson. The first report
    /// creates the progress row; enrollment is not required.
    #[instrument(skip(self, student), fields(student_id = %student.id))]
    pub async fn update_lesson_progress(
        &self,
        student: &User,
        course_id: Uuid,
        lesson_id: Uuid,
        reported_percent: f64,
    ) -> Result<LessonProgress> {
        let lesson = self
            .store
            .lesson(lesson_id)
            .await?
            .filter(|l| l.course_id == course_id)
            .ok_or_else(|| EngineError::not_found("lesson"))?;

        let existing = self.store.lesson_progress(student.id, lesson.id).await?;
        let updated = apply_progress(existing, student.id, lesson.id, reported_percent, Utc::now());
        Ok(self.store.upsert_lesson_progress(updated).await?)
    }

    /// Builds the full mastery overview for a student: every subject with
    /// its topics in curriculum order, untested topics reported with zero
    /// mastery and zero attempts.
    pub async fn subject_progress(&self, student_id: Uuid) -> Result<Vec<SubjectProgress>> {
        let masteries: std::collections::HashMap<Uuid, _> = self
            .store
            .masteries_for_student(student_id)
            .await?
            .into_iter()
            .map(|m| (m.topic_id, m))
            .collect();

        let mut overview = Vec::new();
        for subject in self.store.subjects().await? {
            let topics = self
                .store
                .topics_for_subject(subject.id)
                .await?
                .into_iter()
                .map(|topic| {
                    let mastery = masteries.get(&topic.id);
                    TopicProgress {
                        topic_id: topic.id,
                        title: topic.title,
                        order_num: topic.order_num,
                        mastery_level: mastery.map_or(0.0, |m| m.mastery_level),
                        attempts_count: mastery.map_or(0, |m| m.attempts_count),
                        last_tested_at: mastery.and_then(|m| m.last_tested_at),
                    }
                })
                .collect();
            overview.push(SubjectProgress {
                subject_id: subject.id,
                name: subject.name,
                topics,
            });
        }
        Ok(overview)
    }
}
