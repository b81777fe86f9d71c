//! Entity types persisted by the [`Store`](crate::Store).
//!
//! All entities carry UUID v4 identifiers and UTC timestamps. Question and
//! answer payloads are explicit typed records validated at the store
//! boundary rather than opaque JSON blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Role assigned to a user account at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// A learner: joins a group via invite code, takes exams.
    Student,
    /// An instructor: joins an institution via short code, authors content.
    Teacher,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Teacher => write!(f, "teacher"),
        }
    }
}

/// Lifecycle status of a [`LearningSession`].
///
/// Only `Testing` is driven by current logic. The remaining values are
/// reserved for an adaptive retest flow that has not been designed yet;
/// nothing transitions into them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Student is actively taking exams for this subject.
    #[default]
    Testing,
    /// Reserved.
    Explaining,
    /// Reserved.
    Practicing,
    /// Reserved.
    Retesting,
    /// Reserved.
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Testing => write!(f, "testing"),
            Self::Explaining => write!(f, "explaining"),
            Self::Practicing => write!(f, "practicing"),
            Self::Retesting => write!(f, "retesting"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Completion status of a [`LessonProgress`] record.
///
/// Driven solely by `progress_percent` crossing 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    /// No progress recorded yet.
    #[default]
    NotStarted,
    /// Some progress below 100 percent.
    InProgress,
    /// Progress reached 100 percent.
    Completed,
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// How the answers in an [`ExamAttempt`] were captured.
///
/// Current logic always records `MultipleChoice`; the other values are
/// reserved for answer formats the platform does not score yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    /// Option selected from a fixed set.
    #[default]
    MultipleChoice,
    /// Reserved.
    OpenText,
    /// Reserved.
    Photo,
    /// Reserved.
    Document,
}

// ============================================================================
// Identity & membership
// ============================================================================

/// An institution (school, college) that users and groups belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Institution {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Natural key used by teachers at registration.
    pub short_code: String,
    /// When the institution was created.
    pub created_at: DateTime<Utc>,
}

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Unique login email.
    pub email: String,
    /// Opaque password digest produced by the credential service.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Role fixed at registration.
    pub role: UserRole,
    /// Display name.
    pub full_name: String,
    /// Institution the account belongs to. Derived from the group for
    /// students, supplied via short code for teachers.
    pub institution_id: Uuid,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Role profile for a student, created together with the user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    /// The owning user.
    pub user_id: Uuid,
    /// Group joined via invite code.
    pub group_id: Option<Uuid>,
}

/// Role profile for a teacher, created together with the user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherProfile {
    /// The owning user.
    pub user_id: Uuid,
}

/// A student group within an institution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Teacher who owns the group, if any.
    pub teacher_id: Option<Uuid>,
    /// Institution the group belongs to.
    pub institution_id: Uuid,
    /// Natural key used by students at registration.
    pub invite_code: String,
}

// ============================================================================
// Curriculum graph
// ============================================================================

/// A subject grouping an ordered set of topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// User who created the subject, if tracked.
    pub created_by: Option<Uuid>,
}

/// A topic within a subject. Topics may nest via `parent_id` and are
/// ordered by `order_num` for sequential progression.
///
/// Topics are treated as immutable once referenced by an exam; there is no
/// cascading re-score on edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning subject.
    pub subject_id: Uuid,
    /// Parent topic for nested topics.
    pub parent_id: Option<Uuid>,
    /// Display title, also fed to the quiz generator.
    pub title: String,
    /// Position within the subject.
    pub order_num: i32,
}

/// A course offered by an institution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Institution offering the course.
    pub institution_id: Uuid,
    /// Teacher who created the course.
    pub created_by: Uuid,
    /// Inactive courses are hidden from listings.
    pub is_active: bool,
}

/// A lesson within a course, optionally bound to a topic.
///
/// The topic binding gates exam generation: a lesson without a `topic_id`
/// cannot produce an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning course.
    pub course_id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lesson body content.
    pub content: Option<String>,
    /// Optional video attachment.
    pub video_url: Option<String>,
    /// Expected duration in minutes.
    pub duration_minutes: i32,
    /// Position within the course.
    pub order_num: i32,
    /// Unpublished lessons are hidden from students.
    pub is_published: bool,
    /// Topic this lesson teaches, required for exam generation.
    pub topic_id: Option<Uuid>,
}

/// Marks a student as enrolled in a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollment {
    /// The course.
    pub course_id: Uuid,
    /// The enrolled student.
    pub student_id: Uuid,
    /// When the student enrolled.
    pub enrolled_at: DateTime<Utc>,
}

// ============================================================================
// Lesson progress
// ============================================================================

/// Per-(student, lesson) completion tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    /// The lesson being tracked.
    pub lesson_id: Uuid,
    /// The student.
    pub student_id: Uuid,
    /// Derived from `progress_percent`.
    pub status: LessonStatus,
    /// Clamped to [0, 100].
    pub progress_percent: f64,
    /// When the record was first created.
    pub started_at: DateTime<Utc>,
    /// Last time progress was reported.
    pub last_accessed_at: DateTime<Utc>,
    /// Set once when progress first reaches 100.
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Exam lifecycle
// ============================================================================

/// One active testing context per (student, subject).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    /// Unique identifier.
    pub id: Uuid,
    /// The student taking exams.
    pub student_id: Uuid,
    /// The subject under test.
    pub subject_id: Uuid,
    /// Lifecycle status; only `Testing` is driven by current logic.
    pub status: SessionStatus,
    /// When the session opened.
    pub started_at: DateTime<Utc>,
    /// Reserved; never set by current logic.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A generated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Prompt text shown to the student.
    pub prompt: String,
    /// Fixed set of answer options, at least two.
    pub options: Vec<String>,
    /// The designated correct option, always a member of `options`.
    pub correct_option: String,
}

impl Question {
    /// Returns `true` if the question has a well-formed shape: at least
    /// two options and a correct option drawn from them.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.prompt.trim().is_empty()
            && self.options.len() >= 2
            && self.options.contains(&self.correct_option)
    }
}

/// Immutable snapshot of a generated quiz.
///
/// Exams are never edited after creation; resubmission creates new
/// [`ExamAttempt`] rows instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    /// Unique identifier.
    pub id: Uuid,
    /// The learning session this exam belongs to.
    pub session_id: Uuid,
    /// The topic under test.
    pub topic_id: Uuid,
    /// Difficulty level 1-5.
    pub difficulty: u8,
    /// Ordered question sequence.
    pub questions: Vec<Question>,
    /// Whether this exam is a retest. Reserved; current logic never sets it.
    pub is_retest: bool,
    /// When the exam was generated.
    pub created_at: DateTime<Utc>,
}

/// A single answer within a submission, addressed by question index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    /// Zero-based index into the exam's question sequence.
    pub question_index: usize,
    /// The option the student selected.
    pub selected_option: String,
}

/// One immutable scored submission against an exam. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAttempt {
    /// Unique identifier.
    pub id: Uuid,
    /// The exam submitted against.
    pub exam_id: Uuid,
    /// The submitting student.
    pub student_id: Uuid,
    /// Raw answers as submitted.
    pub answers: Vec<SubmittedAnswer>,
    /// Capture format of the answers.
    pub answer_type: AnswerType,
    /// Computed score in [0, 100].
    pub score: f64,
    /// When the submission was recorded.
    pub submitted_at: DateTime<Utc>,
}

/// AI-generated error analysis, at most one per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Unique identifier.
    pub id: Uuid,
    /// The analyzed attempt (1:1).
    pub attempt_id: Uuid,
    /// Score at the time of analysis.
    pub score: f64,
    /// Plain-language breakdown of the mistakes.
    pub explanation: String,
    /// Topics the student appears weak on.
    pub weak_topics: Vec<String>,
    /// What to revisit next.
    pub recommendation: String,
    /// When the analysis was produced.
    pub created_at: DateTime<Utc>,
}

/// Per-(student, topic) mastery record. Exactly one row per pair.
///
/// `mastery_level` reflects the most recent attempt's score, not a
/// historical aggregate; `attempts_count` alone carries history depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentTopicMastery {
    /// Unique identifier.
    pub id: Uuid,
    /// The student.
    pub student_id: Uuid,
    /// The topic.
    pub topic_id: Uuid,
    /// Latest score in [0, 100].
    pub mastery_level: f64,
    /// Reserved; never written by current logic.
    pub confidence: f64,
    /// Total number of attempts for this pair. Monotonically increasing.
    pub attempts_count: u32,
    /// Timestamp of the most recent attempt.
    pub last_tested_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_question_well_formed() {
        let q = Question {
            prompt: "What is 2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_option: "4".to_string(),
        };
        assert!(q.is_well_formed());
    }

    #[test]
    fn test_question_rejects_foreign_correct_option() {
        let q = Question {
            prompt: "What is 2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_option: "5".to_string(),
        };
        assert!(!q.is_well_formed());
    }

    #[test]
    fn test_question_rejects_single_option() {
        let q = Question {
            prompt: "Pick one".to_string(),
            options: vec!["only".to_string()],
            correct_option: "only".to_string(),
        };
        assert!(!q.is_well_formed());
    }

    #[test]
    fn test_question_rejects_blank_prompt() {
        let q = Question {
            prompt: "   ".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_option: "a".to_string(),
        };
        assert!(!q.is_well_formed());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(
            serde_json::to_string(&UserRole::Student).unwrap(),
            r#""student""#
        );
        assert_eq!(
            serde_json::to_string(&UserRole::Teacher).unwrap(),
            r#""teacher""#
        );
    }

    #[test]
    fn test_session_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Testing).unwrap(),
            r#""testing""#
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Retesting).unwrap(),
            r#""retesting""#
        );
    }

    #[test]
    fn test_session_status_default_is_testing() {
        assert_eq!(SessionStatus::default(), SessionStatus::Testing);
    }

    #[test]
    fn test_lesson_status_display() {
        assert_eq!(LessonStatus::NotStarted.to_string(), "not_started");
        assert_eq!(LessonStatus::InProgress.to_string(), "in_progress");
        assert_eq!(LessonStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            password_hash: "secret-digest".to_string(),
            role: UserRole::Student,
            full_name: "A B".to_string(),
            institution_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-digest"));
    }
}
