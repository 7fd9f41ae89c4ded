// src/models/quiz_result.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};

/// Graded outcome of one question inside a submission.
/// Serialized as a JSON array into `quiz_results.answers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: i64,
    pub correct: bool,
    /// `None` when the question was skipped.
    pub submitted_answer: Option<Value>,
    pub correct_answer: String,
}

/// Represents the 'quiz_results' table in the database.
/// One row per submission; a user may have several rows for the same quiz.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: i32,
    #[serde(rename = "results")]
    pub answers: Json<Vec<QuestionOutcome>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A graded submission ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewQuizResult {
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: i32,
    pub outcomes: Vec<QuestionOutcome>,
}

/// One `{questionId, answer}` pair of a submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub answer: Option<Value>,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Response body of a graded submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub result_id: i64,
    pub score: i32,
    pub total_points: i32,
    pub results: Vec<QuestionOutcome>,
}

/// Aggregates over all result rows of one quiz.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStats {
    pub attempt_count: i64,
    /// `None` while nobody has submitted.
    pub average_score: Option<f64>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,
}

/// Per-question correctness counts across all submissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStat {
    pub question_id: i64,
    pub question_text: String,
    pub correct_count: i64,
    pub incorrect_count: i64,
    /// Fraction of graded answers that were correct, 0.0 with no attempts.
    pub correct_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnalysis {
    pub quiz_id: i64,
    pub title: String,
    pub total_points: i32,
    pub stats: ScoreStats,
    pub questions: Vec<QuestionStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakPoint {
    pub question_id: i64,
    pub question_text: Option<String>,
    pub submitted_answer: Option<Value>,
    pub correct_answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlan {
    pub quiz_id: i64,
    pub user_id: i64,
    pub result_id: i64,
    pub score: i32,
    pub weak_points: Vec<WeakPoint>,
    // Not generated yet; kept so clients can rely on the response shape.
    pub recommended_materials: Vec<String>,
    pub review_schedule: Vec<String>,
}

/// Query parameters of the review-plan endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlanParams {
    pub user_id: Option<i64>,
}
