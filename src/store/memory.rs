// src/store/memory.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

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

/// Process-local store with the same constraints as the SQL schema.
///
/// Used when no `DATABASE_URL` is configured and by the test suites. All data
/// is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    seq: i64,
    users: Vec<User>,
    groups: Vec<StudyGroup>,
    members: Vec<MemberRow>,
    quizzes: Vec<Quiz>,
    questions: Vec<Question>,
    results: Vec<QuizResult>,
}

struct MemberRow {
    group_id: i64,
    user_id: i64,
    role: GroupRole,
    joined_at: DateTime<Utc>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    fn user_exists(&self, user_id: i64) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }
}

fn check_violation(relation: &str, constraint: &str) -> AppError {
    AppError::InternalServerError(format!(
        "new row for relation \"{}\" violates check constraint \"{}\"",
        relation, constraint
    ))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut t = self.inner.write().await;
        if t.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
        }

        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            device_token: None,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let t = self.inner.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn set_device_token(&self, user_id: i64, token: Option<&str>) -> Result<(), AppError> {
        let mut t = self.inner.write().await;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        user.device_token = token.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: i64,
    ) -> Result<StudyGroup, AppError> {
        let mut t = self.inner.write().await;
        if !t.user_exists(owner_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let now = Utc::now();
        let group = StudyGroup {
            id: t.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id,
            created_at: now,
        };
        t.members.push(MemberRow {
            group_id: group.id,
            user_id: owner_id,
            role: GroupRole::Admin,
            joined_at: now,
        });
        t.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<StudyGroup>, AppError> {
        let t = self.inner.read().await;
        Ok(t.groups.iter().find(|g| g.id == group_id).cloned())
    }

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<StudyGroup>, AppError> {
        let t = self.inner.read().await;
        let mut groups: Vec<StudyGroup> = t
            .groups
            .iter()
            .filter(|g| {
                t.members
                    .iter()
                    .any(|m| m.group_id == g.id && m.user_id == user_id)
            })
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(groups)
    }

    async fn add_member(&self, group_id: i64, user_id: i64, role: GroupRole) -> Result<(), AppError> {
        let mut t = self.inner.write().await;
        if !t.user_exists(user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if !t.groups.iter().any(|g| g.id == group_id) {
            return Err(AppError::NotFound("Group not found".to_string()));
        }
        if t
            .members
            .iter()
            .any(|m| m.group_id == group_id && m.user_id == user_id)
        {
            return Err(AppError::Conflict(
                "User is already a member of this group".to_string(),
            ));
        }

        t.members.push(MemberRow {
            group_id,
            user_id,
            role,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    async fn member_role(&self, group_id: i64, user_id: i64) -> Result<Option<GroupRole>, AppError> {
        let t = self.inner.read().await;
        Ok(t
            .members
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
            .map(|m| m.role))
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<GroupMember>, AppError> {
        let t = self.inner.read().await;
        let members = t
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .filter_map(|m| {
                let user = t.users.iter().find(|u| u.id == m.user_id)?;
                Some(GroupMember {
                    user_id: m.user_id,
                    username: user.username.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        Ok(members)
    }

    async fn member_device_tokens(
        &self,
        group_id: i64,
        exclude_user_id: i64,
    ) -> Result<Vec<String>, AppError> {
        let t = self.inner.read().await;
        let tokens = t
            .members
            .iter()
            .filter(|m| m.group_id == group_id && m.user_id != exclude_user_id)
            .filter_map(|m| t.users.iter().find(|u| u.id == m.user_id))
            .filter_map(|u| u.device_token.clone())
            .collect();
        Ok(tokens)
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_quiz(&self, new: &NewQuiz) -> Result<QuizDetail, AppError> {
        let mut t = self.inner.write().await;

        if !t.groups.iter().any(|g| g.id == new.group_id) {
            return Err(AppError::InternalServerError(
                "insert on table \"quizzes\" violates foreign key constraint".to_string(),
            ));
        }
        if matches!(new.time_limit, Some(limit) if limit <= 0) {
            return Err(check_violation("quizzes", "quizzes_time_limit_check"));
        }

        // Rows are staged and only published once every one of them is valid.
        let quiz = Quiz {
            id: t.next_id(),
            group_id: new.group_id,
            creator_id: new.creator_id,
            title: new.title.clone(),
            description: new.description.clone(),
            time_limit: new.time_limit,
            created_at: Utc::now(),
        };

        let mut staged = Vec::with_capacity(new.questions.len());
        for (position, spec) in new.questions.iter().enumerate() {
            if spec.points < 0 {
                return Err(check_violation("quiz_questions", "quiz_questions_points_check"));
            }
            staged.push(Question {
                id: t.next_id(),
                quiz_id: quiz.id,
                position: position as i32,
                question_text: spec.question_text.clone(),
                question_type: spec.question_type.clone(),
                options: Json(spec.options.clone()),
                correct_answer: spec.correct_answer.clone(),
                points: spec.points,
            });
        }

        t.quizzes.push(quiz.clone());
        t.questions.extend(staged.iter().cloned());

        Ok(QuizDetail {
            quiz,
            questions: staged,
        })
    }

    async fn list_quizzes(&self, group_id: i64) -> Result<Vec<Quiz>, AppError> {
        let t = self.inner.read().await;
        let mut quizzes: Vec<Quiz> = t
            .quizzes
            .iter()
            .filter(|q| q.group_id == group_id)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(quizzes)
    }

    async fn find_quiz(&self, group_id: i64, quiz_id: i64) -> Result<Option<QuizDetail>, AppError> {
        let t = self.inner.read().await;
        let Some(quiz) = t
            .quizzes
            .iter()
            .find(|q| q.id == quiz_id && q.group_id == group_id)
            .cloned()
        else {
            return Ok(None);
        };

        let mut questions: Vec<Question> = t
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.position, q.id));

        Ok(Some(QuizDetail { quiz, questions }))
    }

    async fn delete_quiz(&self, group_id: i64, quiz_id: i64) -> Result<bool, AppError> {
        let mut t = self.inner.write().await;
        let before = t.quizzes.len();
        t.quizzes
            .retain(|q| !(q.id == quiz_id && q.group_id == group_id));
        if t.quizzes.len() == before {
            return Ok(false);
        }

        t.questions.retain(|q| q.quiz_id != quiz_id);
        t.results.retain(|r| r.quiz_id != quiz_id);
        Ok(true)
    }

    async fn insert_result(&self, result: &NewQuizResult) -> Result<QuizResult, AppError> {
        let mut t = self.inner.write().await;
        if !t.quizzes.iter().any(|q| q.id == result.quiz_id) {
            return Err(AppError::InternalServerError(
                "insert on table \"quiz_results\" violates foreign key constraint".to_string(),
            ));
        }

        let row = QuizResult {
            id: t.next_id(),
            quiz_id: result.quiz_id,
            user_id: result.user_id,
            score: result.score,
            answers: Json(result.outcomes.clone()),
            created_at: Utc::now(),
        };
        t.results.push(row.clone());
        Ok(row)
    }

    async fn score_stats(&self, quiz_id: i64) -> Result<ScoreStats, AppError> {
        let t = self.inner.read().await;
        let scores: Vec<i32> = t
            .results
            .iter()
            .filter(|r| r.quiz_id == quiz_id)
            .map(|r| r.score)
            .collect();

        let attempt_count = scores.len() as i64;
        let average_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
        };

        Ok(ScoreStats {
            attempt_count,
            average_score,
            min_score: scores.iter().copied().min(),
            max_score: scores.iter().copied().max(),
        })
    }

    async fn result_outcomes(&self, quiz_id: i64) -> Result<Vec<Vec<QuestionOutcome>>, AppError> {
        let t = self.inner.read().await;
        Ok(t
            .results
            .iter()
            .filter(|r| r.quiz_id == quiz_id)
            .map(|r| r.answers.0.clone())
            .collect())
    }

    async fn latest_result(&self, quiz_id: i64, user_id: i64) -> Result<Option<QuizResult>, AppError> {
        let t = self.inner.read().await;
        Ok(t
            .results
            .iter()
            .filter(|r| r.quiz_id == quiz_id && r.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuestionSpec;

    fn spec(text: &str, answer: &str, points: i32) -> QuestionSpec {
        QuestionSpec {
            question_text: text.to_string(),
            question_type: "multiple_choice".to_string(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer: answer.to_string(),
            points,
        }
    }

    async fn seeded() -> (MemoryStore, i64, i64) {
        let store = MemoryStore::new();
        let owner = store.create_user("owner", "hash").await.unwrap();
        let group = store.create_group("Biology", None, owner.id).await.unwrap();
        (store, owner.id, group.id)
    }

    fn new_quiz(group_id: i64, creator_id: i64, questions: Vec<QuestionSpec>) -> NewQuiz {
        NewQuiz {
            group_id,
            creator_id,
            title: "Cells".to_string(),
            description: None,
            time_limit: Some(10),
            questions,
        }
    }

    fn result(quiz_id: i64, user_id: i64, score: i32) -> NewQuizResult {
        NewQuizResult {
            quiz_id,
            user_id,
            score,
            outcomes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_quiz_persists_every_question() {
        let (store, owner, group) = seeded().await;
        let questions = vec![spec("Q1", "A", 1), spec("Q2", "B", 2), spec("Q3", "C", 3)];

        let created = store
            .create_quiz(&new_quiz(group, owner, questions))
            .await
            .unwrap();
        let loaded = store.find_quiz(group, created.quiz.id).await.unwrap().unwrap();

        assert_eq!(loaded.questions.len(), 3);
        assert!(loaded.questions.iter().all(|q| q.quiz_id == created.quiz.id));
        let positions: Vec<i32> = loaded.questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn failing_question_leaves_nothing_behind() {
        let (store, owner, group) = seeded().await;
        let questions = vec![spec("Q1", "A", 1), spec("Q2", "B", -5), spec("Q3", "C", 1)];

        let err = store
            .create_quiz(&new_quiz(group, owner, questions))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InternalServerError(_)));
        assert!(store.list_quizzes(group).await.unwrap().is_empty());
        assert!(store.inner.read().await.questions.is_empty());
    }

    #[tokio::test]
    async fn quiz_is_scoped_to_its_group() {
        let (store, owner, group) = seeded().await;
        let other = store.create_group("Chemistry", None, owner).await.unwrap();
        let created = store
            .create_quiz(&new_quiz(group, owner, vec![spec("Q1", "A", 1)]))
            .await
            .unwrap();

        assert!(store.find_quiz(other.id, created.quiz.id).await.unwrap().is_none());
        assert!(!store.delete_quiz(other.id, created.quiz.id).await.unwrap());
    }

    #[tokio::test]
    async fn score_stats_aggregate() {
        let (store, owner, group) = seeded().await;
        let quiz = store
            .create_quiz(&new_quiz(group, owner, vec![spec("Q1", "A", 30)]))
            .await
            .unwrap();

        for score in [10, 20, 30] {
            store.insert_result(&result(quiz.quiz.id, owner, score)).await.unwrap();
        }

        let stats = store.score_stats(quiz.quiz.id).await.unwrap();
        assert_eq!(stats.attempt_count, 3);
        assert_eq!(stats.average_score, Some(20.0));
        assert_eq!(stats.min_score, Some(10));
        assert_eq!(stats.max_score, Some(30));
    }

    #[tokio::test]
    async fn score_stats_without_attempts() {
        let (store, owner, group) = seeded().await;
        let quiz = store
            .create_quiz(&new_quiz(group, owner, vec![spec("Q1", "A", 1)]))
            .await
            .unwrap();

        let stats = store.score_stats(quiz.quiz.id).await.unwrap();
        assert_eq!(stats.attempt_count, 0);
        assert_eq!(stats.average_score, None);
        assert_eq!(stats.max_score, None);
    }

    #[tokio::test]
    async fn latest_result_picks_newest_row() {
        let (store, owner, group) = seeded().await;
        let quiz = store
            .create_quiz(&new_quiz(group, owner, vec![spec("Q1", "A", 1)]))
            .await
            .unwrap();

        store.insert_result(&result(quiz.quiz.id, owner, 0)).await.unwrap();
        let second = store.insert_result(&result(quiz.quiz.id, owner, 1)).await.unwrap();

        let latest = store.latest_result(quiz.quiz.id, owner).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.score, 1);
    }

    #[tokio::test]
    async fn delete_quiz_cascades() {
        let (store, owner, group) = seeded().await;
        let quiz = store
            .create_quiz(&new_quiz(group, owner, vec![spec("Q1", "A", 1)]))
            .await
            .unwrap();
        store.insert_result(&result(quiz.quiz.id, owner, 1)).await.unwrap();

        assert!(store.delete_quiz(group, quiz.quiz.id).await.unwrap());

        let t = store.inner.read().await;
        assert!(t.questions.is_empty());
        assert!(t.results.is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user("alice", "h").await.unwrap();
        let err = store.create_user("alice", "h").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn device_tokens_exclude_sender_and_unset() {
        let (store, owner, group) = seeded().await;
        let with_token = store.create_user("with", "h").await.unwrap();
        let without = store.create_user("without", "h").await.unwrap();
        store.add_member(group, with_token.id, GroupRole::Member).await.unwrap();
        store.add_member(group, without.id, GroupRole::Member).await.unwrap();
        store.set_device_token(with_token.id, Some("tok-1")).await.unwrap();
        store.set_device_token(owner, Some("tok-owner")).await.unwrap();

        let tokens = store.member_device_tokens(group, owner).await.unwrap();
        assert_eq!(tokens, vec!["tok-1".to_string()]);
    }
}
