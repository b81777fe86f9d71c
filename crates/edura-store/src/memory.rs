//! In-memory [`Store`] implementation.
//!
//! All tables live behind a single async mutex, so every trait method is
//! one atomic step against the dataset. This is what makes the compound
//! primitives (`find_or_create_testing_session`, `record_attempt`,
//! `create_user`) safe under concurrent requests: the check and the act
//! happen under the same lock acquisition. A relational backend would use
//! row locks or upsert-with-retry to get the same guarantee.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::{
    AiAnalysis, Course, CourseEnrollment, Exam, ExamAttempt, Group, Institution, LearningSession,
    Lesson, LessonProgress, SessionStatus, StudentProfile, StudentTopicMastery, Subject,
    TeacherProfile, Topic, User,
};
use crate::{
    LessonPatch, NewAnalysis, NewAttempt, NewCourse, NewExam, NewGroup, NewLesson, NewProfile,
    NewTopic, NewUser, Result, Store, StoreError,
};

/// Backing tables for [`MemoryStore`].
#[derive(Debug, Default)]
struct Tables {
    institutions: HashMap<Uuid, Institution>,
    users: HashMap<Uuid, User>,
    teacher_profiles: HashMap<Uuid, TeacherProfile>,
    student_profiles: HashMap<Uuid, StudentProfile>,
    groups: HashMap<Uuid, Group>,
    subjects: HashMap<Uuid, Subject>,
    topics: HashMap<Uuid, Topic>,
    courses: HashMap<Uuid, Course>,
    lessons: HashMap<Uuid, Lesson>,
    enrollments: Vec<CourseEnrollment>,
    /// Keyed by (student, lesson).
    lesson_progress: HashMap<(Uuid, Uuid), LessonProgress>,
    sessions: HashMap<Uuid, LearningSession>,
    exams: HashMap<Uuid, Exam>,
    attempts: HashMap<Uuid, ExamAttempt>,
    analyses: HashMap<Uuid, AiAnalysis>,
    /// Keyed by (student, topic) to enforce the uniqueness invariant.
    masteries: HashMap<(Uuid, Uuid), StudentTopicMastery>,
}

/// In-memory transactional store.
///
/// Cloning is cheap; clones share the same backing tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut t = self.tables.lock().await;

        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::conflict("user", "email", new.email));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            full_name: new.full_name,
            institution_id: new.institution_id,
            created_at: Utc::now(),
        };

        // User row and role profile become visible together.
        match new.profile {
            NewProfile::Teacher => {
                t.teacher_profiles
                    .insert(user.id, TeacherProfile { user_id: user.id });
            }
            NewProfile::Student { group_id } => {
                t.student_profiles.insert(
                    user.id,
                    StudentProfile {
                        user_id: user.id,
                        group_id: Some(group_id),
                    },
                );
            }
        }
        t.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.get(&id).cloned())
    }

    async fn create_institution(&self, name: &str, short_code: &str) -> Result<Institution> {
        let mut t = self.tables.lock().await;

        if t.institutions.values().any(|i| i.short_code == short_code) {
            return Err(StoreError::conflict("institution", "short_code", short_code));
        }

        let institution = Institution {
            id: Uuid::new_v4(),
            name: name.to_string(),
            short_code: short_code.to_string(),
            created_at: Utc::now(),
        };
        t.institutions.insert(institution.id, institution.clone());
        Ok(institution)
    }

    async fn institution_by_code(&self, short_code: &str) -> Result<Option<Institution>> {
        let t = self.tables.lock().await;
        Ok(t.institutions
            .values()
            .find(|i| i.short_code == short_code)
            .cloned())
    }

    async fn create_group(&self, new: NewGroup) -> Result<Group> {
        let mut t = self.tables.lock().await;

        if !t.institutions.contains_key(&new.institution_id) {
            return Err(StoreError::not_found("institution"));
        }
        if t.groups.values().any(|g| g.invite_code == new.invite_code) {
            return Err(StoreError::conflict("group", "invite_code", new.invite_code));
        }

        let group = Group {
            id: Uuid::new_v4(),
            name: new.name,
            teacher_id: new.teacher_id,
            institution_id: new.institution_id,
            invite_code: new.invite_code,
        };
        t.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn group_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>> {
        let t = self.tables.lock().await;
        Ok(t.groups
            .values()
            .find(|g| g.invite_code == invite_code)
            .cloned())
    }

    async fn create_subject(&self, name: &str, created_by: Option<Uuid>) -> Result<Subject> {
        let mut t = self.tables.lock().await;
        let subject = Subject {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_by,
        };
        t.subjects.insert(subject.id, subject.clone());
        Ok(subject)
    }

    async fn subjects(&self) -> Result<Vec<Subject>> {
        let t = self.tables.lock().await;
        let mut subjects: Vec<Subject> = t.subjects.values().cloned().collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    async fn create_topic(&self, new: NewTopic) -> Result<Topic> {
        let mut t = self.tables.lock().await;

        if !t.subjects.contains_key(&new.subject_id) {
            return Err(StoreError::not_found("subject"));
        }
        if let Some(parent_id) = new.parent_id {
            if !t.topics.contains_key(&parent_id) {
                return Err(StoreError::not_found("topic"));
            }
        }

        let topic = Topic {
            id: Uuid::new_v4(),
            subject_id: new.subject_id,
            parent_id: new.parent_id,
            title: new.title,
            order_num: new.order_num,
        };
        t.topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    async fn topic(&self, id: Uuid) -> Result<Option<Topic>> {
        let t = self.tables.lock().await;
        Ok(t.topics.get(&id).cloned())
    }

    async fn topics_for_subject(&self, subject_id: Uuid) -> Result<Vec<Topic>> {
        let t = self.tables.lock().await;
        let mut topics: Vec<Topic> = t
            .topics
            .values()
            .filter(|topic| topic.subject_id == subject_id)
            .cloned()
            .collect();
        topics.sort_by_key(|topic| topic.order_num);
        Ok(topics)
    }

    async fn create_course(&self, new: NewCourse) -> Result<Course> {
        let mut t = self.tables.lock().await;
        let course = Course {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            institution_id: new.institution_id,
            created_by: new.created_by,
            is_active: true,
        };
        t.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn course(&self, id: Uuid) -> Result<Option<Course>> {
        let t = self.tables.lock().await;
        Ok(t.courses.get(&id).cloned())
    }

    async fn courses_for_institution(&self, institution_id: Uuid) -> Result<Vec<Course>> {
        let t = self.tables.lock().await;
        let mut courses: Vec<Course> = t
            .courses
            .values()
            .filter(|c| c.institution_id == institution_id)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn create_lesson(&self, new: NewLesson) -> Result<Lesson> {
        let mut t = self.tables.lock().await;

        if !t.courses.contains_key(&new.course_id) {
            return Err(StoreError::not_found("course"));
        }

        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id: new.course_id,
            title: new.title,
            description: new.description,
            content: new.content,
            video_url: new.video_url,
            duration_minutes: new.duration_minutes,
            order_num: new.order_num,
            is_published: false,
            topic_id: new.topic_id,
        };
        t.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        let t = self.tables.lock().await;
        Ok(t.lessons.get(&id).cloned())
    }

    async fn update_lesson(&self, id: Uuid, patch: LessonPatch) -> Result<Lesson> {
        let mut t = self.tables.lock().await;
        let lesson = t
            .lessons
            .get_mut(&id)
            .ok_or(StoreError::not_found("lesson"))?;

        if let Some(title) = patch.title {
            lesson.title = title;
        }
        if let Some(description) = patch.description {
            lesson.description = Some(description);
        }
        if let Some(content) = patch.content {
            lesson.content = Some(content);
        }
        if let Some(video_url) = patch.video_url {
            lesson.video_url = Some(video_url);
        }
        if let Some(duration_minutes) = patch.duration_minutes {
            lesson.duration_minutes = duration_minutes;
        }
        if let Some(order_num) = patch.order_num {
            lesson.order_num = order_num;
        }
        if let Some(is_published) = patch.is_published {
            lesson.is_published = is_published;
        }
        if let Some(topic_id) = patch.topic_id {
            lesson.topic_id = Some(topic_id);
        }

        Ok(lesson.clone())
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.lessons
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::not_found("lesson"))
    }

    async fn lessons_for_course(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let t = self.tables.lock().await;
        let mut lessons: Vec<Lesson> = t
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order_num);
        Ok(lessons)
    }

    async fn enroll(&self, course_id: Uuid, student_id: Uuid) -> Result<CourseEnrollment> {
        let mut t = self.tables.lock().await;

        if !t.courses.contains_key(&course_id) {
            return Err(StoreError::not_found("course"));
        }
        if t.enrollments
            .iter()
            .any(|e| e.course_id == course_id && e.student_id == student_id)
        {
            return Err(StoreError::conflict(
                "enrollment",
                "course_id",
                course_id.to_string(),
            ));
        }

        let enrollment = CourseEnrollment {
            course_id,
            student_id,
            enrolled_at: Utc::now(),
        };
        t.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid) -> Result<bool> {
        let t = self.tables.lock().await;
        Ok(t.enrollments
            .iter()
            .any(|e| e.course_id == course_id && e.student_id == student_id))
    }

    async fn lesson_progress(
        &self,
        student_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Option<LessonProgress>> {
        let t = self.tables.lock().await;
        Ok(t.lesson_progress.get(&(student_id, lesson_id)).cloned())
    }

    async fn lesson_progress_for_student(&self, student_id: Uuid) -> Result<Vec<LessonProgress>> {
        let t = self.tables.lock().await;
        Ok(t.lesson_progress
            .values()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn upsert_lesson_progress(&self, progress: LessonProgress) -> Result<LessonProgress> {
        let mut t = self.tables.lock().await;

        if !t.lessons.contains_key(&progress.lesson_id) {
            return Err(StoreError::not_found("lesson"));
        }

        t.lesson_progress
            .insert((progress.student_id, progress.lesson_id), progress.clone());
        Ok(progress)
    }

    async fn find_or_create_testing_session(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<LearningSession> {
        let mut t = self.tables.lock().await;

        if let Some(session) = t.sessions.values().find(|s| {
            s.student_id == student_id
                && s.subject_id == subject_id
                && s.status == SessionStatus::Testing
        }) {
            return Ok(session.clone());
        }

        let session = LearningSession {
            id: Uuid::new_v4(),
            student_id,
            subject_id,
            status: SessionStatus::Testing,
            started_at: Utc::now(),
            completed_at: None,
        };
        t.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn create_exam(&self, new: NewExam) -> Result<Exam> {
        let mut t = self.tables.lock().await;

        if !t.sessions.contains_key(&new.session_id) {
            return Err(StoreError::not_found("learning session"));
        }
        if !t.topics.contains_key(&new.topic_id) {
            return Err(StoreError::not_found("topic"));
        }

        let exam = Exam {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            topic_id: new.topic_id,
            difficulty: new.difficulty,
            questions: new.questions,
            is_retest: new.is_retest,
            created_at: Utc::now(),
        };
        t.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn exam(&self, id: Uuid) -> Result<Option<Exam>> {
        let t = self.tables.lock().await;
        Ok(t.exams.get(&id).cloned())
    }

    async fn record_attempt(
        &self,
        new: NewAttempt,
    ) -> Result<(ExamAttempt, StudentTopicMastery)> {
        let mut t = self.tables.lock().await;

        if !t.exams.contains_key(&new.exam_id) {
            return Err(StoreError::not_found("exam"));
        }

        let now = Utc::now();
        let attempt = ExamAttempt {
            id: Uuid::new_v4(),
            exam_id: new.exam_id,
            student_id: new.student_id,
            answers: new.answers,
            answer_type: new.answer_type,
            score: new.score,
            submitted_at: now,
        };
        t.attempts.insert(attempt.id, attempt.clone());

        // Upsert under the same lock as the attempt insert: the uniqueness
        // invariant on (student, topic) holds no matter how many
        // submissions race.
        let mastery = t
            .masteries
            .entry((new.student_id, new.topic_id))
            .or_insert_with(|| StudentTopicMastery {
                id: Uuid::new_v4(),
                student_id: new.student_id,
                topic_id: new.topic_id,
                mastery_level: 0.0,
                confidence: 0.0,
                attempts_count: 0,
                last_tested_at: None,
            });
        mastery.mastery_level = new.score;
        mastery.attempts_count += 1;
        mastery.last_tested_at = Some(now);

        Ok((attempt, mastery.clone()))
    }

    async fn save_analysis(&self, new: NewAnalysis) -> Result<AiAnalysis> {
        let mut t = self.tables.lock().await;

        if !t.attempts.contains_key(&new.attempt_id) {
            return Err(StoreError::not_found("exam attempt"));
        }
        if t.analyses.values().any(|a| a.attempt_id == new.attempt_id) {
            return Err(StoreError::conflict(
                "analysis",
                "attempt_id",
                new.attempt_id.to_string(),
            ));
        }

        let analysis = AiAnalysis {
            id: Uuid::new_v4(),
            attempt_id: new.attempt_id,
            score: new.score,
            explanation: new.explanation,
            weak_topics: new.weak_topics,
            recommendation: new.recommendation,
            created_at: Utc::now(),
        };
        t.analyses.insert(analysis.id, analysis.clone());
        Ok(analysis)
    }

    async fn masteries_for_student(&self, student_id: Uuid) -> Result<Vec<StudentTopicMastery>> {
        let t = self.tables.lock().await;
        Ok(t.masteries
            .values()
            .filter(|m| m.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn attempts_for_topic(
        &self,
        student_id: Uuid,
        topic_id: Uuid,
    ) -> Result<Vec<ExamAttempt>> {
        let t = self.tables.lock().await;
        let topic_exams: Vec<Uuid> = t
            .exams
            .values()
            .filter(|e| e.topic_id == topic_id)
            .map(|e| e.id)
            .collect();
        let mut attempts: Vec<ExamAttempt> = t
            .attempts
            .values()
            .filter(|a| a.student_id == student_id && topic_exams.contains(&a.exam_id))
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.submitted_at);
        Ok(attempts)
    }
}
