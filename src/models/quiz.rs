// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

pub const DEFAULT_QUESTION_TYPE: &str = "multiple_choice";

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub group_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Time limit in minutes. `None` means untimed.
    pub time_limit: Option<i32>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// Zero-based index in the order the questions were submitted.
    pub position: i32,

    pub question_text: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,

    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    pub correct_answer: String,
    pub points: i32,
}

/// Question as shown to members taking the quiz (no correct answer).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub position: i32,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub options: Vec<String>,
    pub points: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            position: q.position,
            question_text: q.question_text,
            question_type: q.question_type,
            options: q.options.0,
            points: q.points,
        }
    }
}

/// A quiz together with its questions, ordered by position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

impl QuizDetail {
    pub fn total_points(&self) -> i32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn into_public(self) -> PublicQuizDetail {
        PublicQuizDetail {
            quiz: self.quiz,
            questions: self.questions.into_iter().map(PublicQuestion::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for one question inside a quiz creation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    #[serde(alias = "question")]
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 characters"))]
    pub question_text: String,

    #[serde(rename = "type", default = "default_question_type")]
    #[validate(length(min = 1, max = 20))]
    pub question_type: String,

    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,

    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,

    #[serde(default = "default_points")]
    #[validate(range(min = 0, max = 1000, message = "Points must be between 0 and 1000"))]
    pub points: i32,
}

/// DTO for creating a quiz.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "Time limit must be at least one minute"))]
    pub time_limit: Option<i32>,

    #[validate(length(min = 1, message = "A quiz needs at least one question"), nested)]
    pub questions: Vec<QuestionSpec>,
}

/// Everything the store needs to persist a quiz and its questions in one go.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub group_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit: Option<i32>,
    pub questions: Vec<QuestionSpec>,
}

fn default_question_type() -> String {
    DEFAULT_QUESTION_TYPE.to_string()
}

fn default_points() -> i32 {
    1
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
