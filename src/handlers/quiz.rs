// src/handlers/quiz.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        group::{GroupRole, Membership},
        quiz::CreateQuizRequest,
        quiz_result::{ReviewPlanParams, SubmitQuizRequest},
    },
    services::QuizService,
    utils::extract::{ApiJson, ApiPath, ApiQuery},
};

/// Creates a quiz with its questions. Group admin only.
///
/// The quiz row and every question row are written in a single transaction.
pub async fn create_quiz(
    State(quiz): State<QuizService>,
    Extension(membership): Extension<Membership>,
    ApiJson(req): ApiJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let detail = quiz
        .create_quiz(membership.group_id, membership.user_id, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "quiz": detail })),
    ))
}

/// Lists the quizzes of the group, newest first.
pub async fn list_quizzes(
    State(quiz): State<QuizService>,
    Extension(membership): Extension<Membership>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = quiz.list_quizzes(membership.group_id).await?;
    Ok(Json(json!({ "success": true, "quizzes": quizzes })))
}

/// Returns a quiz with its questions, correct answers hidden.
pub async fn get_quiz(
    State(quiz): State<QuizService>,
    ApiPath((group_id, quiz_id)): ApiPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let detail = quiz.get_quiz(group_id, quiz_id).await?;
    Ok(Json(json!({ "success": true, "quiz": detail.into_public() })))
}

/// Deletes a quiz together with its questions and results. Group admin only.
pub async fn delete_quiz(
    State(quiz): State<QuizService>,
    ApiPath((group_id, quiz_id)): ApiPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    quiz.delete_quiz(group_id, quiz_id).await?;
    Ok(Json(json!({ "success": true, "message": "Quiz deleted" })))
}

/// Grades the caller's answers and stores the result.
pub async fn submit_quiz(
    State(quiz): State<QuizService>,
    Extension(membership): Extension<Membership>,
    ApiPath((group_id, quiz_id)): ApiPath<(i64, i64)>,
    ApiJson(req): ApiJson<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let graded = quiz
        .submit(group_id, quiz_id, membership.user_id, &req.answers)
        .await?;

    Ok(Json(json!({
        "success": true,
        "resultId": graded.result_id,
        "score": graded.score,
        "totalPoints": graded.total_points,
        "results": graded.results,
    })))
}

/// Aggregate score statistics and per-question correctness. Group admin only.
pub async fn quiz_analysis(
    State(quiz): State<QuizService>,
    ApiPath((group_id, quiz_id)): ApiPath<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let analysis = quiz.analyze(group_id, quiz_id).await?;
    Ok(Json(json!({ "success": true, "analysis": analysis })))
}

/// Weak points from the latest submission of the caller, or of `?userId=`
/// when the caller is a group admin or manager.
pub async fn review_plan(
    State(quiz): State<QuizService>,
    Extension(membership): Extension<Membership>,
    ApiPath((group_id, quiz_id)): ApiPath<(i64, i64)>,
    ApiQuery(params): ApiQuery<ReviewPlanParams>,
) -> Result<impl IntoResponse, AppError> {
    let target = params.user_id.unwrap_or(membership.user_id);
    if target != membership.user_id && !membership.role.satisfies(GroupRole::Manager) {
        return Err(AppError::Forbidden(
            "Only admins and managers can view another member's review plan".to_string(),
        ));
    }

    let plan = quiz.review_plan(group_id, quiz_id, target).await?;
    Ok(Json(json!({ "success": true, "reviewPlan": plan })))
}
