use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use crate::models::users::{CurrentUser, NewUserForm, UserPatch};
use crate::services::dashboard::DashboardRequest;
use crate::services::roster::RosterRequest;
use crate::services::ServiceError;

#[derive(Clone)]
struct AppState {
    dashboard_channel: mpsc::Sender<DashboardRequest>,
    roster_channel: mpsc::Sender<RosterRequest>,
}

// Identity forwarded by the upstream auth proxy. Authentication itself is
// not this service's job; absence of the headers is a 401.
fn identity(headers: &HeaderMap) -> Option<CurrentUser> {
    let id = headers.get("x-auth-user-id")?.to_str().ok()?.to_string();
    let first_name = headers
        .get("x-auth-user-name")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let is_admin = headers
        .get("x-auth-admin")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == "true")
        .unwrap_or(false);

    Some(CurrentUser {
        id,
        first_name,
        is_admin,
    })
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"description": "Missing identity headers."})),
    )
        .into_response()
}

fn service_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"description": "Service is not available."})),
    )
        .into_response()
}

fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"description": message})),
        )
            .into_response(),
        ServiceError::Conflict { assigned_contacts } => (
            StatusCode::CONFLICT,
            Json(json!({
                "assignedContacts": assigned_contacts,
                "description": format!(
                    "{} contacts are still assigned to this user. Reassign them before deactivating.",
                    assigned_contacts
                ),
            })),
        )
            .into_response(),
        // Non-admins are sent back to the home page.
        ServiceError::Forbidden => Redirect::to("/").into_response(),
        ServiceError::Backend(message) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"description": message})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct DestructiveParams {
    #[serde(default)]
    confirmed: bool,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GoalDraft {
    goal: String,
}

async fn get_dashboard(State(state): State<AppState>) -> Response {
    let (tx, rx) = oneshot::channel();
    let sent = state
        .dashboard_channel
        .send(DashboardRequest::GetDashboard { response: tx })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(view)) => (StatusCode::OK, Json(json!(view))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn begin_goal_edit(State(state): State<AppState>) -> Response {
    let (tx, rx) = oneshot::channel();
    let sent = state
        .dashboard_channel
        .send(DashboardRequest::BeginGoalEdit { response: tx })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(editor) => (StatusCode::OK, Json(json!(editor))).into_response(),
        Err(_) => service_unavailable(),
    }
}

async fn cancel_goal_edit(State(state): State<AppState>) -> Response {
    let (tx, rx) = oneshot::channel();
    let sent = state
        .dashboard_channel
        .send(DashboardRequest::CancelGoalEdit { response: tx })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(editor) => (StatusCode::OK, Json(json!(editor))).into_response(),
        Err(_) => service_unavailable(),
    }
}

async fn save_weekly_goal(State(state): State<AppState>, Json(body): Json<GoalDraft>) -> Response {
    let (tx, rx) = oneshot::channel();
    let sent = state
        .dashboard_channel
        .send(DashboardRequest::SaveWeeklyGoal {
            draft: body.goal,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(goal)) => (StatusCode::OK, Json(json!({"weeklyGoal": goal}))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(actor) = identity(&headers) else {
        return unauthenticated();
    };

    let (tx, rx) = oneshot::channel();
    let sent = state
        .roster_channel
        .send(RosterRequest::ListUsers {
            actor,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(view)) => (StatusCode::OK, Json(json!(view))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<NewUserForm>,
) -> Response {
    let Some(actor) = identity(&headers) else {
        return unauthenticated();
    };

    let (tx, rx) = oneshot::channel();
    let sent = state
        .roster_channel
        .send(RosterRequest::CreateUser {
            actor,
            form,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(view)) => (StatusCode::CREATED, Json(json!(view))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Response {
    let Some(actor) = identity(&headers) else {
        return unauthenticated();
    };

    let (tx, rx) = oneshot::channel();
    let sent = state
        .roster_channel
        .send(RosterRequest::UpdateUser {
            actor,
            id,
            patch,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(view)) => (StatusCode::OK, Json(json!(view))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DestructiveParams>,
) -> Response {
    let Some(actor) = identity(&headers) else {
        return unauthenticated();
    };

    let email = params.email.unwrap_or_else(|| id.clone());
    let (tx, rx) = oneshot::channel();
    let sent = state
        .roster_channel
        .send(RosterRequest::ResetPassword {
            actor,
            id,
            email,
            confirmed: params.confirmed,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(reset)) => (
            StatusCode::OK,
            Json(json!({
                "tempPasswordShown": reset.temp_password.is_some(),
                "tempPassword": reset.temp_password,
            })),
        )
            .into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

async fn deactivate_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DestructiveParams>,
) -> Response {
    let Some(actor) = identity(&headers) else {
        return unauthenticated();
    };

    let email = params.email.unwrap_or_else(|| id.clone());
    let (tx, rx) = oneshot::channel();
    let sent = state
        .roster_channel
        .send(RosterRequest::DeactivateUser {
            actor,
            id,
            email,
            confirmed: params.confirmed,
            response: tx,
        })
        .await;

    if sent.is_err() {
        return service_unavailable();
    }

    match rx.await {
        Ok(Ok(view)) => (StatusCode::OK, Json(json!(view))).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => service_unavailable(),
    }
}

pub async fn start_http_server(
    listen: &str,
    dashboard_channel: mpsc::Sender<DashboardRequest>,
    roster_channel: mpsc::Sender<RosterRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        dashboard_channel,
        roster_channel,
    };

    let app = Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/goal/edit", post(begin_goal_edit))
        .route("/dashboard/goal/cancel", post(cancel_goal_edit))
        .route("/dashboard/goal", put(save_weekly_goal))
        .route("/users", get(list_users))
        .route("/users", post(create_user))
        .route("/users/{id}", put(update_user))
        .route("/users/{id}", delete(deactivate_user))
        .route("/users/{id}/reset-password", post(reset_password))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_a_user_id() {
        let mut headers = HeaderMap::new();
        assert!(identity(&headers).is_none());

        headers.insert("x-auth-user-id", "u1".parse().unwrap());
        headers.insert("x-auth-admin", "true".parse().unwrap());
        let actor = identity(&headers).unwrap();
        assert_eq!(actor.id, "u1");
        assert!(actor.is_admin);
    }

    #[test]
    fn anything_but_true_is_not_admin() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-user-id", "u1".parse().unwrap());
        headers.insert("x-auth-admin", "yes".parse().unwrap());
        assert!(!identity(&headers).unwrap().is_admin);
    }

    #[test]
    fn conflict_maps_to_409_with_the_count() {
        let response = error_response(ServiceError::Conflict {
            assigned_contacts: 3,
        });
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn forbidden_redirects_away_from_the_roster() {
        let response = error_response(ServiceError::Forbidden);
        assert!(response.status().is_redirection());
    }
}
