//! Exam lifecycle: generation, gating, scoring and mastery updates.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use edura_quizgen::Analysis;
use edura_store::{
    AnswerType, Exam, ExamAttempt, LessonStatus, NewAttempt, NewExam, Question,
    StudentTopicMastery, SubmittedAnswer, User, UserRole,
};

use crate::error::{EngineError, Result};
use crate::Platform;

/// A freshly generated exam, ready to hand to the student.
#[derive(Debug, Clone)]
pub struct GeneratedExam {
    /// The persisted exam snapshot.
    pub exam: Exam,
    /// Title of the topic under test.
    pub topic_title: String,
    /// Title of the originating lesson, when generated from one.
    pub lesson_title: Option<String>,
}

/// The result of scoring and recording one submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The recorded attempt.
    pub attempt: ExamAttempt,
    /// The mastery row after the update.
    pub mastery: StudentTopicMastery,
    /// Questions answered correctly.
    pub correct_count: usize,
    /// Total questions in the exam.
    pub total_questions: usize,
    /// AI analysis, absent when the collaborator failed.
    pub analysis: Option<Analysis>,
}

impl SubmissionOutcome {
    /// Score in [0, 100].
    #[must_use]
    pub fn score(&self) -> f64 {
        self.attempt.score
    }

    /// Human-readable "correct/total" summary.
    #[must_use]
    pub fn correct_summary(&self) -> String {
        format!("{}/{}", self.correct_count, self.total_questions)
    }
}

/// Scores a submission against an exam's question sequence.
///
/// For each question, the first submitted answer addressing its index is
/// compared against the correct option; questions with no matching answer
/// count as incorrect, as do out-of-range indexes. Returns the number of
/// correct answers; the percentage score is `100 * correct / total`.
#[must_use]
pub fn score_answers(questions: &[Question], answers: &[SubmittedAnswer]) -> usize {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| {
            answers
                .iter()
                .find(|a| a.question_index == *i)
                .is_some_and(|a| a.selected_option == q.correct_option)
        })
        .count()
}

impl Platform {
    /// Generates an exam for a topic and persists it.
    ///
    /// Reuses the caller's open `testing` session for the topic's subject,
    /// creating one atomically when absent. Generation failure persists
    /// nothing.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn generate_exam(
        &self,
        user: &User,
        topic_id: Uuid,
        difficulty: u8,
    ) -> Result<GeneratedExam> {
        if !(1..=5).contains(&difficulty) {
            return Err(EngineError::validation(
                "difficulty must be between 1 and 5",
            ));
        }

        let topic = self
            .store
            .topic(topic_id)
            .await?
            .ok_or_else(|| EngineError::not_found("topic"))?;

        let session = self
            .store
            .find_or_create_testing_session(user.id, topic.subject_id)
            .await?;

        let questions = self.quiz.generate(&topic.title, difficulty).await?;

        let exam = self
            .store
            .create_exam(NewExam {
                session_id: session.id,
                topic_id: topic.id,
                difficulty,
                questions,
                is_retest: false,
            })
            .await?;

        info!(
            exam_id = %exam.id,
            topic = %topic.title,
            questions = exam.questions.len(),
            "generated exam"
        );
        Ok(GeneratedExam {
            exam,
            topic_title: topic.title,
            lesson_title: None,
        })
    }

    /// Generates an exam from a lesson, enforcing the lesson gate.
    ///
    /// The lesson must be bound to a topic. Students must have completed
    /// the lesson first; teachers bypass that check to preview exams.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn generate_exam_for_lesson(
        &self,
        user: &User,
        course_id: Uuid,
        lesson_id: Uuid,
        difficulty: u8,
    ) -> Result<GeneratedExam> {
        let lesson = self
            .store
            .lesson(lesson_id)
            .await?
            .filter(|l| l.course_id == course_id)
            .ok_or_else(|| EngineError::not_found("lesson"))?;

        let topic_id = lesson.topic_id.ok_or_else(|| {
            EngineError::misconfigured(
                "lesson has no topic binding",
                "set topicId on the lesson before requesting an exam",
            )
        })?;

        if user.role == UserRole::Student {
            let completed = self
                .store
                .lesson_progress(user.id, lesson.id)
                .await?
                .is_some_and(|p| p.status == LessonStatus::Completed);
            if !completed {
                return Err(EngineError::precondition(
                    "complete the lesson before taking its exam",
                ));
            }
        }

        let mut generated = self.generate_exam(user, topic_id, difficulty).await?;
        generated.lesson_title = Some(lesson.title);
        Ok(generated)
    }

    /// Scores a submission, records it, and updates topic mastery.
    ///
    /// The attempt insert and mastery upsert happen in one atomic store
    /// step. Analysis is best-effort: a collaborator failure is logged and
    /// the outcome simply carries no analysis.
    #[instrument(skip(self, student, answers), fields(student_id = %student.id))]
    pub async fn submit_exam(
        &self,
        student: &User,
        exam_id: Uuid,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<SubmissionOutcome> {
        let exam = self
            .store
            .exam(exam_id)
            .await?
            .ok_or_else(|| EngineError::not_found("exam"))?;

        let total_questions = exam.questions.len();
        if total_questions == 0 {
            return Err(EngineError::InvalidExam { exam_id });
        }

        let correct_count = score_answers(&exam.questions, &answers);
        #[allow(clippy::cast_precision_loss)]
        let score = (correct_count as f64 / total_questions as f64) * 100.0;

        let (attempt, mastery) = self
            .store
            .record_attempt(NewAttempt {
                exam_id: exam.id,
                topic_id: exam.topic_id,
                student_id: student.id,
                answers: answers.clone(),
                answer_type: AnswerType::MultipleChoice,
                score,
            })
            .await?;

        info!(
            exam_id = %exam.id,
            score,
            correct = correct_count,
            total = total_questions,
            attempts = mastery.attempts_count,
            "recorded exam attempt"
        );

        let analysis = self
            .analyze_attempt(&exam, attempt.id, score, &answers)
            .await;

        Ok(SubmissionOutcome {
            attempt,
            mastery,
            correct_count,
            total_questions,
            analysis,
        })
    }

    /// Runs the best-effort analysis step. Never fails the submission.
    async fn analyze_attempt(
        &self,
        exam: &Exam,
        attempt_id: Uuid,
        score: f64,
        answers: &[SubmittedAnswer],
    ) -> Option<Analysis> {
        let topic_title = match self.store.topic(exam.topic_id).await {
            Ok(Some(topic)) => topic.title,
            Ok(None) | Err(_) => {
                warn!(exam_id = %exam.id, "topic missing, skipping analysis");
                return None;
            }
        };

        let analysis = match self
            .quiz
            .analyze(&topic_title, &exam.questions, answers)
            .await
        {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(exam_id = %exam.id, error = %err, "analysis unavailable");
                return None;
            }
        };

        if let Err(err) = self
            .store
            .save_analysis(edura_store::NewAnalysis {
                attempt_id,
                score,
                explanation: analysis.explanation.clone(),
                weak_topics: analysis.weak_topics.clone(),
                recommendation: analysis.recommendation.clone(),
            })
            .await
        {
            warn!(attempt_id = %attempt_id, error = %err, "failed to persist analysis");
        }

        Some(analysis)
    }
}
