//! Task assignment routes.

use axum::{Json, Router, extract::State, extract::rejection::JsonRejection, routing::post};
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::models::{AssignTaskRequest, AssignTaskResponse};
use crate::api::server::AppState;

/// Create the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assign-task/", post(assign_task))
        .route("/assign-task", post(assign_task))
}

/// Assign a task and notify the assignee over both channels.
///
/// Returns 422 if a field is missing or the email is not a valid address;
/// the dispatcher is not invoked in that case. Otherwise the response is
/// always 200: mail delivery problems are reported in `notification`, never
/// as a request failure.
async fn assign_task(
    State(state): State<AppState>,
    payload: Result<Json<AssignTaskRequest>, JsonRejection>,
) -> ApiResult<Json<AssignTaskResponse>> {
    let Json(request) = payload?;
    let assignment = request.into_assignment()?;

    info!(
        assignee = %assignment.assignee_email(),
        "Task assigned"
    );
    let outcome = state.dispatcher.dispatch(assignment).await;

    Ok(Json(AssignTaskResponse::new(outcome)))
}
