// src/services/quiz_service.rs

use std::collections::HashMap;

use serde_json::Value;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::{CreateQuizRequest, NewQuiz, Question, Quiz, QuizDetail, QuestionSpec},
        quiz_result::{
            NewQuizResult, QuestionOutcome, QuestionStat, QuizAnalysis, ReviewPlan,
            SubmissionResponse, SubmittedAnswer, WeakPoint,
        },
    },
    services::notification::{Notifier, PushMessage},
    store::DynStore,
    utils::html::clean_html,
};

/// Result of grading one submission, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedSubmission {
    pub score: i32,
    pub total_points: i32,
    pub outcomes: Vec<QuestionOutcome>,
}

/// Grades `answers` against the quiz's questions.
///
/// Every question yields exactly one outcome, in question order. An answer is
/// correct only if it is the JSON string equal to the stored correct answer;
/// no trimming or case folding. Skipped questions are incorrect with a `null`
/// submitted answer. Answers naming unknown question ids are ignored, and when
/// a question is answered twice the first entry counts, even if it is `null`.
pub fn grade_submission(questions: &[Question], answers: &[SubmittedAnswer]) -> GradedSubmission {
    let mut by_question: HashMap<i64, Option<&Value>> = HashMap::new();
    for answer in answers {
        by_question
            .entry(answer.question_id)
            .or_insert(answer.answer.as_ref());
    }

    let mut score = 0;
    let mut total_points = 0;
    let mut outcomes = Vec::with_capacity(questions.len());

    for question in questions {
        total_points += question.points;
        let submitted = by_question.get(&question.id).copied().flatten();
        let correct = matches!(submitted, Some(Value::String(s)) if *s == question.correct_answer);
        if correct {
            score += question.points;
        }

        outcomes.push(QuestionOutcome {
            question_id: question.id,
            correct,
            submitted_answer: submitted.cloned(),
            correct_answer: question.correct_answer.clone(),
        });
    }

    GradedSubmission {
        score,
        total_points,
        outcomes,
    }
}

/// Counts correct and incorrect answers per question over all submissions.
///
/// Outcomes pointing at questions outside `questions` are ignored.
pub fn tally_question_stats(
    questions: &[Question],
    submissions: &[Vec<QuestionOutcome>],
) -> Vec<QuestionStat> {
    let mut counts: HashMap<i64, (i64, i64)> =
        questions.iter().map(|q| (q.id, (0, 0))).collect();

    for outcome in submissions.iter().flatten() {
        if let Some((correct, incorrect)) = counts.get_mut(&outcome.question_id) {
            if outcome.correct {
                *correct += 1;
            } else {
                *incorrect += 1;
            }
        }
    }

    questions
        .iter()
        .map(|q| {
            let (correct_count, incorrect_count) = counts[&q.id];
            let answered = correct_count + incorrect_count;
            QuestionStat {
                question_id: q.id,
                question_text: q.question_text.clone(),
                correct_count,
                incorrect_count,
                correct_rate: if answered == 0 {
                    0.0
                } else {
                    correct_count as f64 / answered as f64
                },
            }
        })
        .collect()
}

/// Questions answered incorrectly in one submission.
pub fn weak_points(questions: &[Question], outcomes: &[QuestionOutcome]) -> Vec<WeakPoint> {
    outcomes
        .iter()
        .filter(|o| !o.correct)
        .map(|o| WeakPoint {
            question_id: o.question_id,
            question_text: questions
                .iter()
                .find(|q| q.id == o.question_id)
                .map(|q| q.question_text.clone()),
            submitted_answer: o.submitted_answer.clone(),
            correct_answer: o.correct_answer.clone(),
        })
        .collect()
}

// Options and answers stay verbatim: grading compares them byte for byte.
fn sanitize_spec(spec: QuestionSpec) -> QuestionSpec {
    QuestionSpec {
        question_text: clean_html(&spec.question_text),
        ..spec
    }
}

fn sanitize_request(req: CreateQuizRequest) -> CreateQuizRequest {
    CreateQuizRequest {
        title: clean_html(&req.title),
        description: req.description.as_deref().map(clean_html),
        time_limit: req.time_limit,
        questions: req.questions.into_iter().map(sanitize_spec).collect(),
    }
}

/// Quiz workflows of a study group.
///
/// Holds no per-request state; one instance is built at start-up with its
/// store and notifier and shared by every request.
#[derive(Clone)]
pub struct QuizService {
    store: DynStore,
    notifier: Notifier,
}

impl QuizService {
    pub fn new(store: DynStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    async fn load_quiz(&self, group_id: i64, quiz_id: i64) -> Result<QuizDetail, AppError> {
        self.store
            .find_quiz(group_id, quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))
    }

    /// Sanitizes and validates the request, stores the quiz and its questions
    /// atomically and notifies the other group members.
    ///
    /// Length limits are checked after sanitizing, against the text that is
    /// actually stored.
    pub async fn create_quiz(
        &self,
        group_id: i64,
        creator_id: i64,
        req: CreateQuizRequest,
    ) -> Result<QuizDetail, AppError> {
        let req = sanitize_request(req);
        req.validate()?;

        let new_quiz = NewQuiz {
            group_id,
            creator_id,
            title: req.title,
            description: req.description,
            time_limit: req.time_limit,
            questions: req.questions,
        };

        let detail = self.store.create_quiz(&new_quiz).await.map_err(|e| {
            tracing::error!("Failed to create quiz in group {}: {}", group_id, e);
            AppError::InternalServerError("Failed to create quiz".to_string())
        })?;

        tracing::info!(
            quiz_id = detail.quiz.id,
            group_id,
            questions = detail.questions.len(),
            "Quiz created"
        );

        self.announce(&detail.quiz).await;

        Ok(detail)
    }

    async fn announce(&self, quiz: &Quiz) {
        let tokens = match self
            .store
            .member_device_tokens(quiz.group_id, quiz.creator_id)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Failed to load device tokens for quiz announcement: {}", e);
                return;
            }
        };

        let message = PushMessage::new("New quiz", quiz.title.clone())
            .with_data("type", "quiz")
            .with_data("groupId", quiz.group_id.to_string())
            .with_data("quizId", quiz.id.to_string());

        self.notifier.notify_many(&tokens, &message).await;
    }

    pub async fn list_quizzes(&self, group_id: i64) -> Result<Vec<Quiz>, AppError> {
        self.store.list_quizzes(group_id).await
    }

    pub async fn get_quiz(&self, group_id: i64, quiz_id: i64) -> Result<QuizDetail, AppError> {
        self.load_quiz(group_id, quiz_id).await
    }

    pub async fn delete_quiz(&self, group_id: i64, quiz_id: i64) -> Result<(), AppError> {
        if !self.store.delete_quiz(group_id, quiz_id).await? {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        tracing::info!(quiz_id, group_id, "Quiz deleted");
        Ok(())
    }

    /// Grades and stores one submission.
    pub async fn submit(
        &self,
        group_id: i64,
        quiz_id: i64,
        user_id: i64,
        answers: &[SubmittedAnswer],
    ) -> Result<SubmissionResponse, AppError> {
        let quiz = self.load_quiz(group_id, quiz_id).await?;
        let graded = grade_submission(&quiz.questions, answers);

        let saved = self
            .store
            .insert_result(&NewQuizResult {
                quiz_id,
                user_id,
                score: graded.score,
                outcomes: graded.outcomes,
            })
            .await
            .map_err(|e| {
                tracing::error!("Failed to save quiz result for quiz {}: {}", quiz_id, e);
                AppError::InternalServerError("Failed to submit quiz".to_string())
            })?;

        Ok(SubmissionResponse {
            result_id: saved.id,
            score: saved.score,
            total_points: graded.total_points,
            results: saved.answers.0,
        })
    }

    pub async fn analyze(&self, group_id: i64, quiz_id: i64) -> Result<QuizAnalysis, AppError> {
        let quiz = self.load_quiz(group_id, quiz_id).await?;
        let stats = self.store.score_stats(quiz_id).await?;
        let submissions = self.store.result_outcomes(quiz_id).await?;

        Ok(QuizAnalysis {
            quiz_id,
            title: quiz.quiz.title.clone(),
            total_points: quiz.total_points(),
            stats,
            questions: tally_question_stats(&quiz.questions, &submissions),
        })
    }

    /// Weak points of `user_id`, taken from their most recent submission only.
    pub async fn review_plan(
        &self,
        group_id: i64,
        quiz_id: i64,
        user_id: i64,
    ) -> Result<ReviewPlan, AppError> {
        let quiz = self.load_quiz(group_id, quiz_id).await?;
        let latest = self
            .store
            .latest_result(quiz_id, user_id)
            .await?
            .ok_or(AppError::NotFound("No quiz result found".to_string()))?;

        Ok(ReviewPlan {
            quiz_id,
            user_id,
            result_id: latest.id,
            score: latest.score,
            weak_points: weak_points(&quiz.questions, &latest.answers.0),
            recommended_materials: Vec::new(),
            review_schedule: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        services::NoopGateway,
        store::{GroupStore, MemoryStore, UserStore},
    };
    use sqlx::types::Json;

    fn question(id: i64, correct: &str, points: i32) -> Question {
        Question {
            id,
            quiz_id: 1,
            position: id as i32,
            question_text: format!("Question {}", id),
            question_type: "multiple_choice".to_string(),
            options: Json(vec!["A".into(), "B".into(), "C".into()]),
            correct_answer: correct.to_string(),
            points,
        }
    }

    fn answer(question_id: i64, value: Value) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id,
            answer: Some(value),
        }
    }

    #[test]
    fn grades_the_worked_example() {
        let questions = vec![question(1, "B", 5), question(2, "C", 5)];
        let answers = vec![answer(1, json!("B")), answer(2, json!("X"))];

        let graded = grade_submission(&questions, &answers);

        assert_eq!(graded.score, 5);
        assert_eq!(graded.total_points, 10);
        assert!(graded.outcomes[0].correct);
        assert!(!graded.outcomes[1].correct);
        assert_eq!(graded.outcomes[1].correct_answer, "C");
        assert_eq!(graded.outcomes[1].submitted_answer, Some(json!("X")));
    }

    #[test]
    fn empty_submission_scores_zero() {
        let questions = vec![question(1, "A", 2), question(2, "B", 3)];

        let graded = grade_submission(&questions, &[]);

        assert_eq!(graded.score, 0);
        assert_eq!(graded.outcomes.len(), 2);
        assert!(graded.outcomes.iter().all(|o| !o.correct && o.submitted_answer.is_none()));
    }

    #[test]
    fn score_is_sum_of_correct_points() {
        let questions = vec![question(1, "A", 1), question(2, "B", 2), question(3, "C", 4)];
        let answers = vec![answer(1, json!("A")), answer(3, json!("C"))];

        let graded = grade_submission(&questions, &answers);
        let expected: i32 = questions
            .iter()
            .zip(&graded.outcomes)
            .filter(|(_, o)| o.correct)
            .map(|(q, _)| q.points)
            .sum();

        assert_eq!(graded.score, 5);
        assert_eq!(graded.score, expected);
        assert!(graded.outcomes[1].submitted_answer.is_none());
    }

    #[test]
    fn comparison_is_exact() {
        let questions = vec![question(1, "B", 1), question(2, "1", 1), question(3, "C", 1)];
        let answers = vec![answer(1, json!("b")), answer(2, json!(1)), answer(3, json!(" C"))];

        let graded = grade_submission(&questions, &answers);

        assert_eq!(graded.score, 0);
    }

    #[test]
    fn unknown_questions_are_ignored_and_first_answer_wins() {
        let questions = vec![question(1, "A", 3)];
        let answers = vec![answer(99, json!("A")), answer(1, json!("A")), answer(1, json!("B"))];

        let graded = grade_submission(&questions, &answers);

        assert_eq!(graded.score, 3);
        assert_eq!(graded.outcomes.len(), 1);
        assert_eq!(graded.outcomes[0].question_id, 1);
    }

    #[test]
    fn tally_counts_structurally() {
        let questions = vec![question(1, "A", 1), question(2, "B", 1)];
        let first = grade_submission(&questions, &[answer(1, json!("A")), answer(2, json!("A"))]);
        let second = grade_submission(&questions, &[answer(1, json!("A")), answer(2, json!("B"))]);
        let mut foreign = second.outcomes.clone();
        foreign.push(QuestionOutcome {
            question_id: 42,
            correct: true,
            submitted_answer: Some(json!("A")),
            correct_answer: "A".into(),
        });

        let stats = tally_question_stats(&questions, &[first.outcomes, foreign]);

        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].correct_count, stats[0].incorrect_count), (2, 0));
        assert_eq!((stats[1].correct_count, stats[1].incorrect_count), (1, 1));
        assert_eq!(stats[1].correct_rate, 0.5);
    }

    #[test]
    fn tally_without_submissions_is_zero() {
        let stats = tally_question_stats(&[question(1, "A", 1)], &[]);
        assert_eq!(stats[0].correct_count, 0);
        assert_eq!(stats[0].correct_rate, 0.0);
    }

    #[test]
    fn weak_points_are_the_incorrect_questions() {
        let questions = vec![question(1, "A", 1), question(2, "B", 1), question(3, "C", 1)];
        let graded = grade_submission(&questions, &[answer(1, json!("A")), answer(2, json!("C"))]);

        let weak = weak_points(&questions, &graded.outcomes);
        let ids: Vec<i64> = weak.iter().map(|w| w.question_id).collect();

        assert_eq!(ids, vec![2, 3]);
        assert_eq!(weak[0].question_text.as_deref(), Some("Question 2"));
        assert_eq!(weak[1].submitted_answer, None);
    }

    #[test]
    fn null_first_entry_shadows_later_duplicate() {
        let questions = vec![question(1, "A", 2)];
        let answers = vec![
            SubmittedAnswer {
                question_id: 1,
                answer: None,
            },
            answer(1, json!("A")),
        ];

        let graded = grade_submission(&questions, &answers);

        assert_eq!(graded.score, 0);
        assert!(!graded.outcomes[0].correct);
        assert_eq!(graded.outcomes[0].submitted_answer, None);
    }

    async fn service_with_group() -> (QuizService, i64, i64) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.create_user("owner", "hash").await.unwrap();
        let group = store.create_group("Biology", None, owner.id).await.unwrap();
        let service = QuizService::new(store, Notifier::new(Arc::new(NoopGateway)));
        (service, owner.id, group.id)
    }

    fn create_request(title: &str, question_text: &str) -> CreateQuizRequest {
        serde_json::from_value(json!({
            "title": title,
            "questions": [{ "questionText": question_text, "correctAnswer": "A" }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn title_limit_applies_to_sanitized_text() {
        let (service, owner, group) = service_with_group().await;
        // 197 characters as sent, close to 1000 once the ampersands are escaped.
        let title = format!("<i>{}</i>", "&".repeat(190));

        let err = service
            .create_quiz(group, owner, create_request(&title, "Q"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(service.list_quizzes(group).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_stored_verbatim() {
        let (service, owner, group) = service_with_group().await;

        let detail = service
            .create_quiz(group, owner, create_request("Tom & Jerry", "Is 2 < 3 & 4?"))
            .await
            .unwrap();

        assert_eq!(detail.quiz.title, "Tom & Jerry");
        assert_eq!(detail.questions[0].question_text, "Is 2 < 3 & 4?");
    }

    #[tokio::test]
    async fn markup_is_sanitized_before_storing() {
        let (service, owner, group) = service_with_group().await;

        let detail = service
            .create_quiz(group, owner, create_request("Cells<script>x()</script>", "<b>Q</b>"))
            .await
            .unwrap();

        assert_eq!(detail.quiz.title, "Cells");
        assert_eq!(detail.questions[0].question_text, "<b>Q</b>");
    }
}
