// src/store/mod.rs

//! Persistence seam.
//!
//! Handlers and services talk to an `Arc<dyn Store>` instead of a pool, so the
//! same code runs against PostgreSQL in production and against the in-memory
//! store in tests and database-less local runs.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        group::{GroupMember, GroupRole, StudyGroup},
        quiz::{NewQuiz, Quiz, QuizDetail},
        quiz_result::{NewQuizResult, QuestionOutcome, QuizResult, ScoreStats},
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Fails with `NotFound` when the user does not exist.
    async fn set_device_token(&self, user_id: i64, token: Option<&str>) -> Result<(), AppError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Creates the group and makes `owner_id` its admin, atomically.
    async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<StudyGroup, AppError>;

    async fn find_group(&self, group_id: i64) -> Result<Option<StudyGroup>, AppError>;

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<StudyGroup>, AppError>;

    /// Fails with `NotFound` for an unknown user and `Conflict` for an existing member.
    async fn add_member(&self, group_id: i64, user_id: i64, role: GroupRole) -> Result<(), AppError>;

    async fn member_role(&self, group_id: i64, user_id: i64) -> Result<Option<GroupRole>, AppError>;

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, AppError>;

    /// Device tokens of every member except `exclude_user_id` that registered one.
    async fn member_device_tokens(
        &self,
        group_id: i64,
        exclude_user_id: i64,
    ) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Inserts the quiz and all of its questions in one transaction.
    /// Either every row is written or none is.
    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<QuizDetail, AppError>;

    async fn list_quizzes(&self, group_id: i64) -> Result<Vec<Quiz>, AppError>;

    /// Returns `None` when the quiz does not exist or belongs to another group.
    async fn find_quiz(&self, group_id: i64, quiz_id: i64) -> Result<Option<QuizDetail>, AppError>;

    /// Deletes the quiz with its questions and results. Returns `false` if nothing matched.
    async fn delete_quiz(&self, group_id: i64, quiz_id: i64) -> Result<bool, AppError>;

    async fn insert_result(&self, result: &NewQuizResult) -> Result<QuizResult, AppError>;

    async fn score_stats(&self, quiz_id: i64) -> Result<ScoreStats, AppError>;

    /// The deserialized outcome list of every result row of the quiz.
    async fn result_outcomes(&self, quiz_id: i64) -> Result<Vec<Vec<QuestionOutcome>>, AppError>;

    /// Most recently created result of `user_id` for the quiz.
    async fn latest_result(&self, quiz_id: i64, user_id: i64) -> Result<Option<QuizResult>, AppError>;
}

pub trait Store: UserStore + GroupStore + QuizStore {}

impl<T> Store for T where T: UserStore + GroupStore + QuizStore {}
