//! Edura persistence interface
//!
//! Entity types, the [`Store`] trait consumed by the engine, and an
//! in-memory transactional implementation.
//!
//! The trait deliberately exposes *compound* primitives for the operations
//! where separate read and write steps would race under concurrent
//! requests: [`Store::find_or_create_testing_session`],
//! [`Store::record_attempt`] and [`Store::create_user`] each execute as a
//! single atomic step against the backing tables.

pub mod entities;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

pub use entities::{
    AiAnalysis, AnswerType, Course, CourseEnrollment, Exam, ExamAttempt, Group, Institution,
    LearningSession, Lesson, LessonProgress, LessonStatus, Question, SessionStatus,
    StudentProfile, StudentTopicMastery, Subject, SubmittedAnswer, TeacherProfile, Topic, User,
    UserRole,
};
pub use memory::MemoryStore;

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a [`Store`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A mutation referenced an entity that does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// The entity kind that was missing.
        entity: &'static str,
    },

    /// An insert violated a uniqueness constraint.
    #[error("{entity} with {field} '{value}' already exists")]
    Conflict {
        /// The entity kind.
        entity: &'static str,
        /// The constrained field.
        field: &'static str,
        /// The conflicting value.
        value: String,
    },
}

impl StoreError {
    /// Creates a new `NotFound` error for the given entity kind.
    #[must_use]
    pub const fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Creates a new `Conflict` error for the given unique field.
    #[must_use]
    pub fn conflict(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            field,
            value: value.into(),
        }
    }
}

// ============================================================================
// Input records
// ============================================================================

/// Role-specific profile data supplied at user creation.
#[derive(Debug, Clone)]
pub enum NewProfile {
    /// Create a [`TeacherProfile`].
    Teacher,
    /// Create a [`StudentProfile`] linked to the given group.
    Student {
        /// Group resolved from the invite code.
        group_id: Uuid,
    },
}

/// Input for [`Store::create_user`]. The user row and its role profile are
/// created in one atomic step.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique login email.
    pub email: String,
    /// Digest produced by the credential service.
    pub password_hash: String,
    /// Display name.
    pub full_name: String,
    /// Role fixed at registration.
    pub role: entities::UserRole,
    /// Institution the account belongs to.
    pub institution_id: Uuid,
    /// Role profile to create alongside the user row.
    pub profile: NewProfile,
}

/// Input for [`Store::create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
    /// Display name.
    pub name: String,
    /// Owning institution.
    pub institution_id: Uuid,
    /// Owning teacher, if any.
    pub teacher_id: Option<Uuid>,
    /// Unique invite code students use at registration.
    pub invite_code: String,
}

/// Input for [`Store::create_topic`].
#[derive(Debug, Clone)]
pub struct NewTopic {
    /// Owning subject.
    pub subject_id: Uuid,
    /// Parent topic for nesting.
    pub parent_id: Option<Uuid>,
    /// Display title.
    pub title: String,
    /// Position within the subject.
    pub order_num: i32,
}

/// Input for [`Store::create_course`].
#[derive(Debug, Clone)]
pub struct NewCourse {
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Institution offering the course.
    pub institution_id: Uuid,
    /// Creating teacher.
    pub created_by: Uuid,
}

/// Input for [`Store::create_lesson`].
#[derive(Debug, Clone)]
pub struct NewLesson {
    /// Owning course.
    pub course_id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lesson body.
    pub content: Option<String>,
    /// Optional video attachment.
    pub video_url: Option<String>,
    /// Expected duration in minutes.
    pub duration_minutes: i32,
    /// Position within the course.
    pub order_num: i32,
    /// Topic binding, required for exam generation.
    pub topic_id: Option<Uuid>,
}

/// Partial update for [`Store::update_lesson`]. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct LessonPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New body content.
    pub content: Option<String>,
    /// New video attachment.
    pub video_url: Option<String>,
    /// New duration.
    pub duration_minutes: Option<i32>,
    /// New position.
    pub order_num: Option<i32>,
    /// New publication flag.
    pub is_published: Option<bool>,
    /// New topic binding.
    pub topic_id: Option<Uuid>,
}

/// Input for [`Store::create_exam`].
#[derive(Debug, Clone)]
pub struct NewExam {
    /// The session the exam belongs to.
    pub session_id: Uuid,
    /// The topic under test.
    pub topic_id: Uuid,
    /// Difficulty level 1-5.
    pub difficulty: u8,
    /// Generated question sequence.
    pub questions: Vec<Question>,
    /// Retest flag. Reserved; current logic always passes `false`.
    pub is_retest: bool,
}

/// Input for [`Store::record_attempt`].
#[derive(Debug, Clone)]
pub struct NewAttempt {
    /// The exam submitted against.
    pub exam_id: Uuid,
    /// The topic of that exam, used to key the mastery upsert.
    pub topic_id: Uuid,
    /// The submitting student.
    pub student_id: Uuid,
    /// Raw answers as submitted.
    pub answers: Vec<SubmittedAnswer>,
    /// Capture format of the answers.
    pub answer_type: AnswerType,
    /// Computed score in [0, 100].
    pub score: f64,
}

/// Input for [`Store::save_analysis`].
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    /// The analyzed attempt.
    pub attempt_id: Uuid,
    /// Score at the time of analysis.
    pub score: f64,
    /// Plain-language breakdown of the mistakes.
    pub explanation: String,
    /// Topics the student appears weak on.
    pub weak_topics: Vec<String>,
    /// What to revisit next.
    pub recommendation: String,
}

// ============================================================================
// Store trait
// ============================================================================

/// Transactional CRUD over the platform entities.
///
/// Lookups return `Ok(None)` when the target is absent; mutations against a
/// missing target return [`StoreError::NotFound`], and inserts violating a
/// uniqueness constraint return [`StoreError::Conflict`]. Compound
/// operations are atomic: either every row they touch becomes visible
/// together, or none do.
#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------------
    // Identity & membership
    // ------------------------------------------------------------------------

    /// Creates a user row together with its role profile in one atomic step.
    ///
    /// Fails with `Conflict` when the email is already registered, in which
    /// case nothing is persisted.
    async fn create_user(&self, new: NewUser) -> Result<User>;

    /// Looks up a user by unique email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Looks up a user by id.
    async fn user(&self, id: Uuid) -> Result<Option<User>>;

    /// Creates an institution with a unique short code.
    async fn create_institution(&self, name: &str, short_code: &str) -> Result<Institution>;

    /// Resolves an institution by its registration short code.
    async fn institution_by_code(&self, short_code: &str) -> Result<Option<Institution>>;

    /// Creates a group with a unique invite code.
    async fn create_group(&self, new: NewGroup) -> Result<Group>;

    /// Resolves a group by its registration invite code.
    async fn group_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>>;

    // ------------------------------------------------------------------------
    // Curriculum graph
    // ------------------------------------------------------------------------

    /// Creates a subject.
    async fn create_subject(&self, name: &str, created_by: Option<Uuid>) -> Result<Subject>;

    /// Lists all subjects.
    async fn subjects(&self) -> Result<Vec<Subject>>;

    /// Creates a topic under an existing subject.
    async fn create_topic(&self, new: NewTopic) -> Result<Topic>;

    /// Looks up a topic by id.
    async fn topic(&self, id: Uuid) -> Result<Option<Topic>>;

    /// Lists a subject's topics ordered by `order_num`.
    async fn topics_for_subject(&self, subject_id: Uuid) -> Result<Vec<Topic>>;

    /// Creates a course.
    async fn create_course(&self, new: NewCourse) -> Result<Course>;

    /// Looks up a course by id.
    async fn course(&self, id: Uuid) -> Result<Option<Course>>;

    /// Lists courses offered by an institution.
    async fn courses_for_institution(&self, institution_id: Uuid) -> Result<Vec<Course>>;

    /// Creates a lesson under an existing course.
    async fn create_lesson(&self, new: NewLesson) -> Result<Lesson>;

    /// Looks up a lesson by id.
    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>>;

    /// Applies a partial update to an existing lesson.
    async fn update_lesson(&self, id: Uuid, patch: LessonPatch) -> Result<Lesson>;

    /// Deletes a lesson.
    async fn delete_lesson(&self, id: Uuid) -> Result<()>;

    /// Lists a course's lessons ordered by `order_num`.
    async fn lessons_for_course(&self, course_id: Uuid) -> Result<Vec<Lesson>>;

    /// Enrolls a student in a course. Duplicate enrollment is a `Conflict`.
    async fn enroll(&self, course_id: Uuid, student_id: Uuid) -> Result<CourseEnrollment>;

    /// Returns `true` if the student is enrolled in the course.
    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid) -> Result<bool>;

    // ------------------------------------------------------------------------
    // Lesson progress
    // ------------------------------------------------------------------------

    /// Looks up the progress record for a (student, lesson) pair.
    async fn lesson_progress(
        &self,
        student_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Option<LessonProgress>>;

    /// Lists all progress records for a student.
    async fn lesson_progress_for_student(&self, student_id: Uuid) -> Result<Vec<LessonProgress>>;

    /// Inserts or replaces the progress record keyed by (student, lesson).
    async fn upsert_lesson_progress(&self, progress: LessonProgress) -> Result<LessonProgress>;

    // ------------------------------------------------------------------------
    // Exam lifecycle & mastery
    // ------------------------------------------------------------------------

    /// Returns the open `testing` session for (student, subject), creating
    /// it when absent. Atomic: two concurrent calls observe the same
    /// session, never two.
    async fn find_or_create_testing_session(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<LearningSession>;

    /// Persists an immutable exam snapshot.
    async fn create_exam(&self, new: NewExam) -> Result<Exam>;

    /// Looks up an exam by id.
    async fn exam(&self, id: Uuid) -> Result<Option<Exam>>;

    /// Records an attempt and updates mastery in one atomic step.
    ///
    /// Inserts the append-only attempt row and upserts the
    /// (student, topic) mastery row: `mastery_level` is overwritten with
    /// the attempt's score, `attempts_count` incremented, `last_tested_at`
    /// stamped. Concurrent calls for the same pair serialize; exactly one
    /// mastery row exists afterwards.
    async fn record_attempt(
        &self,
        new: NewAttempt,
    ) -> Result<(ExamAttempt, StudentTopicMastery)>;

    /// Persists an analysis linked 1:1 to an attempt.
    async fn save_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis>;

    /// Lists all mastery rows for a student.
    async fn masteries_for_student(&self, student_id: Uuid) -> Result<Vec<StudentTopicMastery>>;

    /// Lists a student's attempts for one topic, oldest first.
    async fn attempts_for_topic(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
    ) -> Result<Vec<ExamAttempt>>;
}

/// Generates a random uppercase alphanumeric invite code of the given
/// length, suitable for group registration codes.
#[must_use]
pub fn generate_invite_code(len: usize) -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            char::from(ALPHABET[idx])
        })
        .collect()
}
