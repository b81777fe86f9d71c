//! Shared fixtures for engine tests: a canned quiz service and a seeded
//! world with one institution, group, teacher, student and course.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_trait::async_trait;

use edura_quizgen::{Analysis, GenerationError, QuizService};
use edura_store::{
    Course, Group, Institution, Lesson, LessonPatch, MemoryStore, NewCourse, NewGroup, NewLesson,
    NewTopic, Question, Store, Subject, SubmittedAnswer, Topic, User, UserRole,
};

use crate::auth::HmacCredentials;
use crate::registration::NewRegistration;
use crate::Platform;

/// Two fixed, well-formed fraction questions.
pub fn quiz_questions() -> Vec<Question> {
    vec![
        Question {
            prompt: "What is 1/2 + 1/4?".to_string(),
            options: vec![
                "1/4".to_string(),
                "2/6".to_string(),
                "3/4".to_string(),
                "1".to_string(),
            ],
            correct_option: "3/4".to_string(),
        },
        Question {
            prompt: "Which fraction equals 0.5?".to_string(),
            options: vec!["1/3".to_string(), "1/2".to_string(), "2/3".to_string()],
            correct_option: "1/2".to_string(),
        },
    ]
}

/// Quiz service returning [`quiz_questions`] and a canned analysis, with
/// switches to simulate collaborator failures.
#[derive(Default)]
pub struct StubQuiz {
    pub fail_generate: bool,
    pub fail_analyze: bool,
}

#[async_trait]
impl QuizService for StubQuiz {
    async fn generate(
        &self,
        _topic_name: &str,
        _difficulty: u8,
    ) -> edura_quizgen::Result<Vec<Question>> {
        if self.fail_generate {
            return Err(GenerationError::Upstream("connection refused".to_string()));
        }
        Ok(quiz_questions())
    }

    async fn analyze(
        &self,
        _topic_name: &str,
        _questions: &[Question],
        _answers: &[SubmittedAnswer],
    ) -> edura_quizgen::Result<Analysis> {
        if self.fail_analyze {
            return Err(GenerationError::Timeout { timeout_secs: 1 });
        }
        Ok(Analysis {
            explanation: "You mixed up denominators.".to_string(),
            weak_topics: vec!["Fractions".to_string()],
            recommendation: "Revisit adding fractions with unlike denominators.".to_string(),
        })
    }
}

/// Entities created by [`platform_with_seed`].
pub struct SeedWorld {
    pub institution: Institution,
    pub group: Group,
    pub teacher: User,
    pub student: User,
    pub subject: Subject,
    pub topic: Topic,
    pub course: Course,
    pub lesson: Lesson,
    pub unbound_lesson: Lesson,
}

/// Builds a platform over a fresh in-memory store with the given quiz
/// service, seeded with one of everything. Teacher password is
/// `teacher-pass`, student password is `student-pass`.
pub async fn platform_with_quiz(quiz: Arc<dyn QuizService>) -> (Platform, SeedWorld) {
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(HmacCredentials::new("test-secret", 30));
    let platform = Platform::new(store.clone(), quiz, credentials);

    let institution = store.create_institution("Test School", "TST").await.unwrap();

    let teacher = platform
        .register(NewRegistration {
            email: "teacher@example.com".to_string(),
            password: "teacher-pass".to_string(),
            full_name: "Tina Teacher".to_string(),
            role: UserRole::Teacher,
            institution_code: Some(institution.short_code.clone()),
            invite_code: None,
        })
        .await
        .unwrap();

    let group = store
        .create_group(NewGroup {
            name: "7A".to_string(),
            institution_id: institution.id,
            teacher_id: Some(teacher.id),
            invite_code: "JOIN7A22".to_string(),
        })
        .await
        .unwrap();

    let student = platform
        .register(NewRegistration {
            email: "student@example.com".to_string(),
            password: "student-pass".to_string(),
            full_name: "Sam Student".to_string(),
            role: UserRole::Student,
            institution_code: None,
            invite_code: Some(group.invite_code.clone()),
        })
        .await
        .unwrap();

    let subject = store
        .create_subject("Mathematics", Some(teacher.id))
        .await
        .unwrap();
    let topic = store
        .create_topic(NewTopic {
            subject_id: subject.id,
            parent_id: None,
            title: "Fractions".to_string(),
            order_num: 1,
        })
        .await
        .unwrap();

    let course = store
        .create_course(NewCourse {
            title: "Math 7".to_string(),
            description: Some("Seventh grade mathematics".to_string()),
            institution_id: institution.id,
            created_by: teacher.id,
        })
        .await
        .unwrap();

    let lesson = store
        .create_lesson(NewLesson {
            course_id: course.id,
            title: "Fractions basics".to_string(),
            description: None,
            content: Some("Numerators and denominators.".to_string()),
            video_url: None,
            duration_minutes: 30,
            order_num: 1,
            topic_id: Some(topic.id),
        })
        .await
        .unwrap();
    let unbound_lesson = store
        .create_lesson(NewLesson {
            course_id: course.id,
            title: "Course intro".to_string(),
            description: None,
            content: None,
            video_url: None,
            duration_minutes: 10,
            order_num: 2,
            topic_id: None,
        })
        .await
        .unwrap();

    // Lessons start unpublished; the seed publishes both.
    let lesson = store
        .update_lesson(
            lesson.id,
            LessonPatch {
                is_published: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let unbound_lesson = store
        .update_lesson(
            unbound_lesson.id,
            LessonPatch {
                is_published: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    (
        platform,
        SeedWorld {
            institution,
            group,
            teacher,
            student,
            subject,
            topic,
            course,
            lesson,
            unbound_lesson,
        },
    )
}

/// Seeded platform with a well-behaved quiz service.
pub async fn platform_with_seed() -> (Platform, SeedWorld) {
    platform_with_quiz(Arc::new(StubQuiz::default())).await
}

/// Seeded platform whose quiz service fails analysis but not generation.
pub async fn platform_with_failing_analysis() -> (Platform, SeedWorld) {
    platform_with_quiz(Arc::new(StubQuiz {
        fail_analyze: true,
        ..Default::default()
    }))
    .await
}

/// Enrolls the seeded student in the seeded course and completes the
/// topic-bound lesson.
pub async fn enroll_and_complete(platform: &Platform, world: &SeedWorld) {
    platform
        .store()
        .enroll(world.course.id, world.student.id)
        .await
        .unwrap();
    platform
        .update_lesson_progress(&world.student, world.course.id, world.lesson.id, 100.0)
        .await
        .unwrap();
}
