//! HTTP API for the Edura platform.
//!
//! # Endpoints
//!
//! - `POST /api/auth/register` - Create an account with role linkage
//! - `POST /api/auth/login` - Exchange credentials for an access token
//! - `GET /api/subjects` - List subjects with their topics
//! - `POST /api/subjects` - Create a subject (teacher)
//! - `POST /api/subjects/:id/topics` - Add a topic (teacher)
//! - `GET /api/subjects/my-progress` - Mastery overview for the caller
//! - `GET /api/courses` - List the caller's institution courses
//! - `POST /api/courses` - Create a course (teacher)
//! - `GET /api/courses/:id` - Course detail with lessons
//! - `POST /api/courses/:id/enroll` - Enroll in a course (student)
//! - `POST /api/courses/:id/lessons` - Add a lesson (teacher)
//! - `PATCH /api/courses/:id/lessons/:lesson_id` - Edit a lesson (teacher)
//! - `DELETE /api/courses/:id/lessons/:lesson_id` - Remove a lesson (teacher)
//! - `POST /api/courses/:id/lessons/:lesson_id/progress` - Report progress
//! - `POST /api/courses/:id/lessons/:lesson_id/exam` - Generate a lesson exam
//! - `POST /api/exams/generate` - Generate an exam for a topic
//! - `POST /api/exams/:id/submit` - Submit answers for scoring
//! - `GET /api/health` - Liveness probe
//!
//! All routes except registration, login and health require a bearer
//! token. Generated questions are returned without their correct option.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use edura_quizgen::Analysis;
use edura_store::{
    Course, CourseEnrollment, Lesson, LessonPatch, LessonProgress, LessonStatus, NewCourse,
    NewLesson, NewTopic, Subject, SubmittedAnswer, Topic, User, UserRole,
};

use crate::engine::GeneratedExam;
use crate::error::EngineError;
use crate::progress::SubjectProgress;
use crate::registration::NewRegistration;
use crate::{Config, Platform};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the registration endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Unique login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Display name.
    pub full_name: String,
    /// Role fixed at registration.
    pub role: UserRole,
    /// Institution short code; required for teachers.
    #[serde(default)]
    pub institution_code: Option<String>,
    /// Group invite code; required for students.
    #[serde(default)]
    pub invite_code: Option<String>,
}

/// Request body for the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Public view of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// Account id.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Account role.
    pub role: UserRole,
    /// Owning institution.
    pub institution_id: Uuid,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            institution_id: user.institution_id,
        }
    }
}

/// Response body for the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Signed bearer token.
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// The authenticated user.
    pub user: UserResponse,
}

/// Request body for subject creation.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectCreateRequest {
    /// Display name.
    pub name: String,
}

/// Request body for topic creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCreateRequest {
    /// Display title.
    pub title: String,
    /// Position within the subject.
    pub order_num: i32,
    /// Parent topic for nesting.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// A subject with its topics in curriculum order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResponse {
    /// Subject id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Topics ordered by `orderNum`.
    pub topics: Vec<TopicResponse>,
}

/// Public view of a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    /// Topic id.
    pub id: Uuid,
    /// Owning subject.
    pub subject_id: Uuid,
    /// Parent topic, when nested.
    pub parent_id: Option<Uuid>,
    /// Display title.
    pub title: String,
    /// Position within the subject.
    pub order_num: i32,
}

impl From<Topic> for TopicResponse {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id,
            subject_id: topic.subject_id,
            parent_id: topic.parent_id,
            title: topic.title,
            order_num: topic.order_num,
        }
    }
}

/// Request body for course creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseCreateRequest {
    /// Display title.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// One course in the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    /// Course id.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Number of lessons visible to the caller.
    pub lessons_count: usize,
    /// Whether the calling student is enrolled.
    pub enrolled: bool,
}

/// Course detail with its lessons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailResponse {
    /// Course id.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Whether the calling student is enrolled.
    pub enrolled: bool,
    /// Lessons visible to the caller, in course order.
    pub lessons: Vec<LessonResponse>,
}

/// Request body for lesson creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCreateRequest {
    /// Display title.
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Lesson body.
    #[serde(default)]
    pub content: Option<String>,
    /// Optional video attachment.
    #[serde(default)]
    pub video_url: Option<String>,
    /// Expected duration in minutes.
    pub duration_minutes: i32,
    /// Position within the course.
    pub order_num: i32,
    /// Topic binding, required for exam generation.
    #[serde(default)]
    pub topic_id: Option<Uuid>,
}

/// Request body for lesson edits. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonUpdateRequest {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New body content.
    #[serde(default)]
    pub content: Option<String>,
    /// New video attachment.
    #[serde(default)]
    pub video_url: Option<String>,
    /// New duration.
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// New position.
    #[serde(default)]
    pub order_num: Option<i32>,
    /// New publication flag.
    #[serde(default)]
    pub is_published: Option<bool>,
    /// New topic binding.
    #[serde(default)]
    pub topic_id: Option<Uuid>,
}

/// Public view of a lesson, with the caller's progress when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonResponse {
    /// Lesson id.
    pub id: Uuid,
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
    /// Whether the lesson is visible to students.
    pub is_published: bool,
    /// Topic binding, when set.
    pub topic_id: Option<Uuid>,
    /// The calling student's progress, when any.
    pub progress: Option<ProgressResponse>,
}

impl LessonResponse {
    fn new(lesson: Lesson, progress: Option<LessonProgress>) -> Self {
        Self {
            id: lesson.id,
            course_id: lesson.course_id,
            title: lesson.title,
            description: lesson.description,
            content: lesson.content,
            video_url: lesson.video_url,
            duration_minutes: lesson.duration_minutes,
            order_num: lesson.order_num,
            is_published: lesson.is_published,
            topic_id: lesson.topic_id,
            progress: progress.map(ProgressResponse::from),
        }
    }
}

/// Request body for progress reports.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    /// Reported completion percentage; clamped to [0, 100].
    pub progress_percent: f64,
}

/// The caller's progress on one lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    /// The lesson.
    pub lesson_id: Uuid,
    /// Completion status.
    pub status: LessonStatus,
    /// Completion percentage in [0, 100].
    pub progress_percent: f64,
    /// Set once progress first reached 100.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<LessonProgress> for ProgressResponse {
    fn from(p: LessonProgress) -> Self {
        Self {
            lesson_id: p.lesson_id,
            status: p.status,
            progress_percent: p.progress_percent,
            completed_at: p.completed_at,
        }
    }
}

/// Enrollment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    /// The course.
    pub course_id: Uuid,
    /// The enrolled student.
    pub student_id: Uuid,
    /// When the student enrolled.
    pub enrolled_at: DateTime<Utc>,
}

impl From<CourseEnrollment> for EnrollmentResponse {
    fn from(e: CourseEnrollment) -> Self {
        Self {
            course_id: e.course_id,
            student_id: e.student_id,
            enrolled_at: e.enrolled_at,
        }
    }
}

/// Request body for topic exam generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateExamRequest {
    /// The topic under test.
    pub topic_id: Uuid,
    /// Difficulty 1-5; the configured default when absent.
    #[serde(default)]
    pub difficulty: Option<u8>,
}

/// Request body for lesson exam generation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonExamRequest {
    /// Difficulty 1-5; the configured default when absent.
    #[serde(default)]
    pub difficulty: Option<u8>,
}

/// A question as shown to the student. The correct option never leaves
/// the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    /// Prompt text.
    pub prompt: String,
    /// Answer options to pick from.
    pub options: Vec<String>,
}

/// Response body for exam generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResponse {
    /// The persisted exam's id, used for submission.
    pub exam_id: Uuid,
    /// Title of the topic under test.
    pub topic: String,
    /// Title of the originating lesson, when generated from one.
    pub lesson_title: Option<String>,
    /// Difficulty the exam was generated at.
    pub difficulty: u8,
    /// Questions in exam order, correct options withheld.
    pub questions: Vec<QuestionView>,
}

impl From<GeneratedExam> for ExamResponse {
    fn from(generated: GeneratedExam) -> Self {
        Self {
            exam_id: generated.exam.id,
            topic: generated.topic_title,
            lesson_title: generated.lesson_title,
            difficulty: generated.exam.difficulty,
            questions: generated
                .exam
                .questions
                .into_iter()
                .map(|q| QuestionView {
                    prompt: q.prompt,
                    options: q.options,
                })
                .collect(),
        }
    }
}

/// Request body for exam submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitExamRequest {
    /// Answers addressed by question index.
    pub answers: Vec<SubmittedAnswerRequest>,
}

/// One answer within a submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswerRequest {
    /// Zero-based index into the exam's questions.
    pub question_index: usize,
    /// The selected option.
    pub selected_option: String,
}

/// The analysis slot of a submission response: the payload when the
/// collaborator delivered, an explicit marker when it did not.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisPayload {
    /// The collaborator delivered an analysis.
    Ready(Analysis),
    /// The collaborator failed; the marker text explains.
    Unavailable(String),
}

/// Response body for exam submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamResponse {
    /// Score in [0, 100].
    pub score: f64,
    /// Human-readable "correct/total" summary.
    pub correct_answers: String,
    /// Analysis payload or unavailability marker.
    pub analysis: AnalysisPayload,
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration.
    pub config: Config,
    /// The assembled platform.
    pub platform: Platform,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(config: Config, platform: Platform) -> Self {
        Self { config, platform }
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::InvalidExam { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            Self::ContentMisconfigured { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if !self.is_client_error() {
            warn!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Authentication Extractor
// ============================================================================

/// Extractor resolving the bearer token to a live user row.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = EngineError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| EngineError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| EngineError::unauthorized("expected a bearer token"))?;

        let user = state.platform.authenticate(token).await?;
        Ok(Self(user))
    }
}

fn require_teacher(user: &User) -> Result<(), EngineError> {
    if user.role == UserRole::Teacher {
        Ok(())
    } else {
        Err(EngineError::forbidden("teacher role required"))
    }
}

fn require_student(user: &User) -> Result<(), EngineError> {
    if user.role == UserRole::Student {
        Ok(())
    } else {
        Err(EngineError::forbidden("student role required"))
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints under `/api`, plus CORS
/// and request tracing middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .route("/subjects", get(handle_list_subjects).post(handle_create_subject))
        .route("/subjects/my-progress", get(handle_my_progress))
        .route("/subjects/:id/topics", post(handle_create_topic))
        .route("/courses", get(handle_list_courses).post(handle_create_course))
        .route("/courses/:id", get(handle_course_detail))
        .route("/courses/:id/enroll", post(handle_enroll))
        .route("/courses/:id/lessons", post(handle_create_lesson))
        .route(
            "/courses/:id/lessons/:lesson_id",
            axum::routing::patch(handle_update_lesson).delete(handle_delete_lesson),
        )
        .route(
            "/courses/:id/lessons/:lesson_id/progress",
            post(handle_lesson_progress),
        )
        .route(
            "/courses/:id/lessons/:lesson_id/exam",
            post(handle_lesson_exam),
        )
        .route("/exams/generate", post(handle_generate_exam))
        .route("/exams/:id/submit", post(handle_submit_exam))
        .route("/health", get(handle_health));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Handler for `POST /api/auth/register`.
async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), EngineError> {
    let user = state
        .platform
        .register(NewRegistration {
            email: request.email,
            password: request.password,
            full_name: request.full_name,
            role: request.role,
            institution_code: request.institution_code,
            invite_code: request.invite_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Handler for `POST /api/auth/login`.
async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, EngineError> {
    let (user, token) = state.platform.login(&request.email, &request.password).await?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

/// Handler for `GET /api/subjects`.
async fn handle_list_subjects(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<SubjectResponse>>, EngineError> {
    let store = state.platform.store();
    let mut out = Vec::new();
    for subject in store.subjects().await? {
        let topics = store
            .topics_for_subject(subject.id)
            .await?
            .into_iter()
            .map(TopicResponse::from)
            .collect();
        out.push(subject_response(subject, topics));
    }
    Ok(Json(out))
}

fn subject_response(subject: Subject, topics: Vec<TopicResponse>) -> SubjectResponse {
    SubjectResponse {
        id: subject.id,
        name: subject.name,
        topics,
    }
}

/// Handler for `POST /api/subjects`.
async fn handle_create_subject(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SubjectCreateRequest>,
) -> Result<(StatusCode, Json<SubjectResponse>), EngineError> {
    require_teacher(&user)?;
    if request.name.trim().is_empty() {
        return Err(EngineError::validation("subject name must not be empty"));
    }
    let subject = state
        .platform
        .store()
        .create_subject(request.name.trim(), Some(user.id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(subject_response(subject, Vec::new())),
    ))
}

/// Handler for `POST /api/subjects/:id/topics`.
async fn handle_create_topic(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(subject_id): Path<Uuid>,
    Json(request): Json<TopicCreateRequest>,
) -> Result<(StatusCode, Json<TopicResponse>), EngineError> {
    require_teacher(&user)?;
    if request.title.trim().is_empty() {
        return Err(EngineError::validation("topic title must not be empty"));
    }
    let topic = state
        .platform
        .store()
        .create_topic(NewTopic {
            subject_id,
            parent_id: request.parent_id,
            title: request.title.trim().to_string(),
            order_num: request.order_num,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(topic.into())))
}

/// Handler for `GET /api/subjects/my-progress`.
async fn handle_my_progress(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<SubjectProgress>>, EngineError> {
    let overview = state.platform.subject_progress(user.id).await?;
    Ok(Json(overview))
}

/// Handler for `GET /api/courses`.
async fn handle_list_courses(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CourseResponse>>, EngineError> {
    let store = state.platform.store();
    let mut out = Vec::new();
    for course in store.courses_for_institution(user.institution_id).await? {
        if !course.is_active {
            continue;
        }
        let lessons = store.lessons_for_course(course.id).await?;
        let lessons_count = match user.role {
            UserRole::Teacher => lessons.len(),
            UserRole::Student => lessons.iter().filter(|l| l.is_published).count(),
        };
        let enrolled = match user.role {
            UserRole::Student => store.is_enrolled(course.id, user.id).await?,
            UserRole::Teacher => false,
        };
        out.push(CourseResponse {
            id: course.id,
            title: course.title,
            description: course.description,
            lessons_count,
            enrolled,
        });
    }
    Ok(Json(out))
}

/// Handler for `POST /api/courses`.
async fn handle_create_course(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CourseCreateRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), EngineError> {
    require_teacher(&user)?;
    if request.title.trim().is_empty() {
        return Err(EngineError::validation("course title must not be empty"));
    }
    let course = state
        .platform
        .store()
        .create_course(NewCourse {
            title: request.title.trim().to_string(),
            description: request.description,
            institution_id: user.institution_id,
            created_by: user.id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            id: course.id,
            title: course.title,
            description: course.description,
            lessons_count: 0,
            enrolled: false,
        }),
    ))
}

/// Resolves a course visible to the user's institution.
async fn visible_course(state: &AppState, user: &User, course_id: Uuid) -> Result<Course, EngineError> {
    state
        .platform
        .store()
        .course(course_id)
        .await?
        .filter(|c| c.institution_id == user.institution_id)
        .ok_or_else(|| EngineError::not_found("course"))
}

/// Handler for `GET /api/courses/:id`.
async fn handle_course_detail(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseDetailResponse>, EngineError> {
    let course = visible_course(&state, &user, course_id).await?;
    let store = state.platform.store();

    let mut lessons = Vec::new();
    for lesson in store.lessons_for_course(course.id).await? {
        if user.role == UserRole::Student && !lesson.is_published {
            continue;
        }
        let progress = match user.role {
            UserRole::Student => store.lesson_progress(user.id, lesson.id).await?,
            UserRole::Teacher => None,
        };
        lessons.push(LessonResponse::new(lesson, progress));
    }

    let enrolled = match user.role {
        UserRole::Student => store.is_enrolled(course.id, user.id).await?,
        UserRole::Teacher => false,
    };

    Ok(Json(CourseDetailResponse {
        id: course.id,
        title: course.title,
        description: course.description,
        enrolled,
        lessons,
    }))
}

/// Handler for `POST /api/courses/:id/enroll`.
async fn handle_enroll(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), EngineError> {
    require_student(&user)?;
    let course = visible_course(&state, &user, course_id).await?;
    let enrollment = state.platform.store().enroll(course.id, user.id).await?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// Handler for `POST /api/courses/:id/lessons`.
async fn handle_create_lesson(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(request): Json<LessonCreateRequest>,
) -> Result<(StatusCode, Json<LessonResponse>), EngineError> {
    require_teacher(&user)?;
    let course = visible_course(&state, &user, course_id).await?;
    let lesson = state
        .platform
        .store()
        .create_lesson(NewLesson {
            course_id: course.id,
            title: request.title,
            description: request.description,
            content: request.content,
            video_url: request.video_url,
            duration_minutes: request.duration_minutes,
            order_num: request.order_num,
            topic_id: request.topic_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(LessonResponse::new(lesson, None))))
}

/// Resolves a lesson within the given course.
async fn course_lesson(
    state: &AppState,
    course_id: Uuid,
    lesson_id: Uuid,
) -> Result<Lesson, EngineError> {
    state
        .platform
        .store()
        .lesson(lesson_id)
        .await?
        .filter(|l| l.course_id == course_id)
        .ok_or_else(|| EngineError::not_found("lesson"))
}

/// Handler for `PATCH /api/courses/:id/lessons/:lesson_id`.
async fn handle_update_lesson(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<LessonUpdateRequest>,
) -> Result<Json<LessonResponse>, EngineError> {
    require_teacher(&user)?;
    visible_course(&state, &user, course_id).await?;
    let lesson = course_lesson(&state, course_id, lesson_id).await?;

    let updated = state
        .platform
        .store()
        .update_lesson(
            lesson.id,
            LessonPatch {
                title: request.title,
                description: request.description,
                content: request.content,
                video_url: request.video_url,
                duration_minutes: request.duration_minutes,
                order_num: request.order_num,
                is_published: request.is_published,
                topic_id: request.topic_id,
            },
        )
        .await?;
    Ok(Json(LessonResponse::new(updated, None)))
}

/// Handler for `DELETE /api/courses/:id/lessons/:lesson_id`.
async fn handle_delete_lesson(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, EngineError> {
    require_teacher(&user)?;
    visible_course(&state, &user, course_id).await?;
    let lesson = course_lesson(&state, course_id, lesson_id).await?;
    state.platform.store().delete_lesson(lesson.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `POST /api/courses/:id/lessons/:lesson_id/progress`.
async fn handle_lesson_progress(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ProgressUpdateRequest>,
) -> Result<Json<ProgressResponse>, EngineError> {
    require_student(&user)?;
    let progress = state
        .platform
        .update_lesson_progress(&user, course_id, lesson_id, request.progress_percent)
        .await?;
    Ok(Json(progress.into()))
}

/// Handler for `POST /api/courses/:id/lessons/:lesson_id/exam`.
async fn handle_lesson_exam(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<LessonExamRequest>,
) -> Result<Json<ExamResponse>, EngineError> {
    let difficulty = request.difficulty.unwrap_or(state.config.default_difficulty);
    let generated = state
        .platform
        .generate_exam_for_lesson(&user, course_id, lesson_id, difficulty)
        .await?;
    Ok(Json(generated.into()))
}

/// Handler for `POST /api/exams/generate`.
async fn handle_generate_exam(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<GenerateExamRequest>,
) -> Result<Json<ExamResponse>, EngineError> {
    let difficulty = request.difficulty.unwrap_or(state.config.default_difficulty);
    let generated = state
        .platform
        .generate_exam(&user, request.topic_id, difficulty)
        .await?;
    Ok(Json(generated.into()))
}

/// Handler for `POST /api/exams/:id/submit`.
async fn handle_submit_exam(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<Uuid>,
    Json(request): Json<SubmitExamRequest>,
) -> Result<Json<SubmitExamResponse>, EngineError> {
    let answers = request
        .answers
        .into_iter()
        .map(|a| SubmittedAnswer {
            question_index: a.question_index,
            selected_option: a.selected_option,
        })
        .collect();

    let outcome = state.platform.submit_exam(&user, exam_id, answers).await?;

    let analysis = match outcome.analysis.clone() {
        Some(analysis) => AnalysisPayload::Ready(analysis),
        None => AnalysisPayload::Unavailable("analysis temporarily unavailable".to_string()),
    };

    Ok(Json(SubmitExamResponse {
        score: outcome.score(),
        correct_answers: outcome.correct_summary(),
        analysis,
    }))
}

// ============================================================================
// Tests
// ============================================================================
