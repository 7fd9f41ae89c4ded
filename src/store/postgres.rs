// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction, types::Json};

use crate::{
    error::AppError,
    models::{
        group::{GroupMember, GroupRole, StudyGroup},
        quiz::{NewQuiz, Question, Quiz, QuizDetail},
        quiz_result::{NewQuizResult, QuestionOutcome, QuizResult, ScoreStats},
        user::User,
    },
    store::{GroupStore, QuizStore, UserStore},
};

/// PostgreSQL-backed store. Cloning shares the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, device_token, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, device_token, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_device_token(&self, user_id: i64, token: Option<&str>) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET device_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<StudyGroup, AppError> {
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, StudyGroup>(
            r#"
            INSERT INTO study_groups (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(group.id)
            .bind(owner_id)
            .bind(GroupRole::Admin.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(group)
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<StudyGroup>, AppError> {
        let group = sqlx::query_as::<_, StudyGroup>(
            "SELECT id, name, description, owner_id, created_at FROM study_groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<StudyGroup>, AppError> {
        let groups = sqlx::query_as::<_, StudyGroup>(
            r#"
            SELECT g.id, g.name, g.description, g.owner_id, g.created_at
            FROM study_groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = $1
            ORDER BY g.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn add_member(&self, group_id: i64, user_id: i64, role: GroupRole) -> Result<(), AppError> {
        sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(group_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("User is already a member of this group".to_string())
                } else if is_foreign_key_violation(&e) {
                    AppError::NotFound("User not found".to_string())
                } else {
                    tracing::error!("Failed to add group member: {:?}", e);
                    AppError::from(e)
                }
            })?;

        Ok(())
    }

    async fn member_role(&self, group_id: i64, user_id: i64) -> Result<Option<GroupRole>, AppError> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM group_members WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        role.map(|r| r.parse::<GroupRole>())
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, AppError> {
        let members = sqlx::query_as::<_, GroupMember>(
            r#"
            SELECT m.user_id, u.username, m.role, m.joined_at
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn member_device_tokens(
        &self,
        group_id: i64,
        exclude_user_id: i64,
    ) -> Result<Vec<String>, AppError> {
        let tokens = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.device_token
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
              AND m.user_id <> $2
              AND u.device_token IS NOT NULL
            "#,
        )
        .bind(group_id)
        .bind(exclude_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }
}

/// Writes the quiz row and its question rows on an open transaction.
async fn insert_quiz_rows(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewQuiz,
) -> Result<QuizDetail, sqlx::Error> {
    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (group_id, creator_id, title, description, time_limit)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, group_id, creator_id, title, description, time_limit, created_at
        "#,
    )
    .bind(new.group_id)
    .bind(new.creator_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.time_limit)
    .fetch_one(&mut **tx)
    .await?;

    let mut questions = Vec::with_capacity(new.questions.len());
    for (position, spec) in new.questions.iter().enumerate() {
        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO quiz_questions
            (quiz_id, position, question_text, type, options, correct_answer, points)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, quiz_id, position, question_text, type, options, correct_answer, points
            "#,
        )
        .bind(quiz.id)
        .bind(position as i32)
        .bind(&spec.question_text)
        .bind(&spec.question_type)
        .bind(Json(&spec.options))
        .bind(&spec.correct_answer)
        .bind(spec.points)
        .fetch_one(&mut **tx)
        .await?;

        questions.push(question);
    }

    Ok(QuizDetail { quiz, questions })
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_quiz(&self, new: &NewQuiz) -> Result<QuizDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        match insert_quiz_rows(&mut tx, new).await {
            Ok(detail) => {
                tx.commit().await?;
                Ok(detail)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Failed to roll back quiz creation: {:?}", rollback_err);
                }
                Err(AppError::from(e))
            }
        }
    }

    async fn list_quizzes(&self, group_id: i64) -> Result<Vec<Quiz>, AppError> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, group_id, creator_id, title, description, time_limit, created_at
            FROM quizzes
            WHERE group_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }

    async fn find_quiz(&self, group_id: i64, quiz_id: i64) -> Result<Option<QuizDetail>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, group_id, creator_id, title, description, time_limit, created_at
            FROM quizzes
            WHERE id = $1 AND group_id = $2
            "#,
        )
        .bind(quiz_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(quiz) = quiz else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, quiz_id, position, question_text, type, options, correct_answer, points
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(quiz.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(QuizDetail { quiz, questions }))
    }

    async fn delete_quiz(&self, group_id: i64, quiz_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM quizzes WHERE id = $1 AND group_id = $2 FOR UPDATE",
        )
        .bind(quiz_id)
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        // Children first: no result or question may outlive its quiz.
        sqlx::query("DELETE FROM quiz_results WHERE quiz_id = $1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn insert_result(&self, result: &NewQuizResult) -> Result<QuizResult, AppError> {
        let row = sqlx::query_as::<_, QuizResult>(
            r#"
            INSERT INTO quiz_results (quiz_id, user_id, score, answers)
            VALUES ($1, $2, $3, $4)
            RETURNING id, quiz_id, user_id, score, answers, created_at
            "#,
        )
        .bind(result.quiz_id)
        .bind(result.user_id)
        .bind(result.score)
        .bind(Json(&result.outcomes))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn score_stats(&self, quiz_id: i64) -> Result<ScoreStats, AppError> {
        let stats = sqlx::query_as::<_, ScoreStats>(
            r#"
            SELECT
                COUNT(*) AS attempt_count,
                AVG(score)::FLOAT8 AS average_score,
                MIN(score) AS min_score,
                MAX(score) AS max_score
            FROM quiz_results
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn result_outcomes(&self, quiz_id: i64) -> Result<Vec<Vec<QuestionOutcome>>, AppError> {
        let rows = sqlx::query_scalar::<_, Json<Vec<QuestionOutcome>>>(
            "SELECT answers FROM quiz_results WHERE quiz_id = $1 ORDER BY id ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(outcomes)| outcomes).collect())
    }

    async fn latest_result(&self, quiz_id: i64, user_id: i64) -> Result<Option<QuizResult>, AppError> {
        let row = sqlx::query_as::<_, QuizResult>(
            r#"
            SELECT id, quiz_id, user_id, score, answers, created_at
            FROM quiz_results
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
