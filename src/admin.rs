use crate::app::AppState;
use crate::charts::{ChartStore, JsonChartStore};
use crate::login::{self, AuthUser, Role, User};
use axum::{
    Extension, Form, Json,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a "become an admin" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A user's request to be promoted to admin, reviewed by existing admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequest {
    pub email: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
}

const REQUESTS_FILE: &str = "database/admin_requests.json";

/// Read all admin requests from disk (missing file reads as none).
pub fn load_requests() -> Result<Vec<AdminRequest>, String> {
    if !std::path::Path::new(REQUESTS_FILE).exists() {
        return Ok(Vec::new());
    }

    let data = std::fs::read_to_string(REQUESTS_FILE)
        .map_err(|_| "Failed to read admin requests".to_string())?;
    serde_json::from_str(&data).map_err(|_| "Failed to parse admin requests".to_string())
}

/// Write the full request list back to disk.
pub fn save_requests(requests: &[AdminRequest]) -> Result<(), String> {
    let json = serde_json::to_string_pretty(requests)
        .map_err(|_| "Failed to serialize admin requests".to_string())?;
    std::fs::write(REQUESTS_FILE, json).map_err(|_| "Failed to write admin requests".to_string())
}

/// Append a pending request for a user, unless one is already open.
pub fn push_request(
    requests: &mut Vec<AdminRequest>,
    email: &str,
    reason: &str,
) -> Result<(), String> {
    if requests
        .iter()
        .any(|r| r.email == email && r.status == RequestStatus::Pending)
    {
        return Err("A request for this user is already pending".to_string());
    }

    requests.push(AdminRequest {
        email: email.to_string(),
        reason: reason.to_string(),
        requested_at: Utc::now(),
        status: RequestStatus::Pending,
    });

    Ok(())
}

/// Mark a user's pending request as approved or rejected.
///
/// # Returns
/// * `Ok(status)` - The status that was applied
/// * `Err` - No pending request exists for that user
pub fn resolve_request(
    requests: &mut [AdminRequest],
    email: &str,
    approve: bool,
) -> Result<RequestStatus, String> {
    let request = requests
        .iter_mut()
        .find(|r| r.email == email && r.status == RequestStatus::Pending)
        .ok_or_else(|| "No pending request for this user".to_string())?;

    request.status = if approve {
        RequestStatus::Approved
    } else {
        RequestStatus::Rejected
    };

    Ok(request.status)
}

/// Submit a "become an admin" request on behalf of a user.
pub fn submit_request(email: &str, reason: &str) -> Result<(), String> {
    let mut requests = load_requests()?;
    push_request(&mut requests, email, reason)?;
    save_requests(&requests)
}

/// Resolve a pending request against the given users map.
///
/// Approval promotes the matching user to [`Role::Admin`] in place;
/// rejection only marks the request and leaves the role untouched.
pub fn apply_review(
    requests: &mut [AdminRequest],
    users: &mut HashMap<String, User>,
    email: &str,
    approve: bool,
) -> Result<RequestStatus, String> {
    let status = resolve_request(requests, email, approve)?;

    if status == RequestStatus::Approved {
        match users.get_mut(email) {
            Some(user) => user.role = Role::Admin,
            None => return Err("User not found".to_string()),
        }
    }

    Ok(status)
}

/// Approve or reject a pending request; approval promotes the user's role.
pub fn review_request(email: &str, approve: bool) -> Result<RequestStatus, String> {
    let mut requests = load_requests()?;
    let mut users = login::get_users()?;

    let status = apply_review(&mut requests, &mut users, email, approve)?;

    save_requests(&requests)?;
    if status == RequestStatus::Approved {
        login::save_users(&users)?;
    }

    Ok(status)
}

// Web handlers (admin-gated)

/// Form data for a "become an admin" request.
#[derive(Debug, Deserialize)]
pub struct AdminRequestForm {
    pub reason: String,
}

/// Reduced user view for the admin console (no password hash).
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub email: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Admin access required").into_response()
}

/// Submit an admin request as the current user (not admin-gated).
pub async fn handle_submit_request(
    Extension(user): Extension<AuthUser>,
    Form(form): Form<AdminRequestForm>,
) -> Response {
    match submit_request(&user.email, &form.reason) {
        Ok(_) => (StatusCode::OK, "Request submitted").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// List all admin requests, pending first.
pub async fn handle_list_requests(Extension(user): Extension<AuthUser>) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match load_requests() {
        Ok(mut requests) => {
            requests.sort_by_key(|r| r.status != RequestStatus::Pending);
            Json(requests).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Approve a pending request, promoting the requester to admin.
pub async fn handle_approve_request(
    Extension(user): Extension<AuthUser>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match review_request(&email, true) {
        Ok(_) => (StatusCode::OK, "Request approved").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// Reject a pending request; the requester keeps their current role.
pub async fn handle_reject_request(
    Extension(user): Extension<AuthUser>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match review_request(&email, false) {
        Ok(_) => (StatusCode::OK, "Request rejected").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// List every registered user.
pub async fn handle_list_users(Extension(user): Extension<AuthUser>) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match login::get_users() {
        Ok(users) => {
            let mut summaries: Vec<UserSummary> = users
                .into_values()
                .map(|u| UserSummary {
                    email: u.email,
                    username: u.username,
                    role: u.role,
                    created_at: u.created_at,
                })
                .collect();
            summaries.sort_by(|a, b| a.email.cmp(&b.email));
            Json(summaries).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Delete a user account along with their uploads and saved charts.
pub async fn handle_delete_user(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }
    if user.email == email {
        return (StatusCode::BAD_REQUEST, "Admins cannot delete themselves").into_response();
    }

    let mut users = match login::get_users() {
        Ok(users) => users,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    if users.remove(&email).is_none() {
        return (StatusCode::NOT_FOUND, "User not found").into_response();
    }

    if let Err(e) = login::save_users(&users) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response();
    }

    // Charts live in the same per-user directory as the uploads
    if let Err(e) = state.ledger.delete_user_data(&email) {
        log::warn!("failed to remove data for deleted user {}: {}", email, e);
    }

    (StatusCode::OK, "User deleted").into_response()
}

/// List any user's uploads.
pub async fn handle_list_user_uploads(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match state.ledger.list_uploads(&email) {
        Ok(uploads) => Json(uploads).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Delete any user's upload.
pub async fn handle_delete_user_upload(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath((email, filename)): AxumPath<(String, String)>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    match state.ledger.delete_upload(&email, &filename) {
        Ok(true) => (StatusCode::OK, "Upload deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Upload not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// List any user's saved charts.
pub async fn handle_list_user_charts(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(email): AxumPath<String>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    let store = JsonChartStore::for_user(&state.database_root, &email);
    match store.list() {
        Ok(charts) => Json(charts).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Delete any user's saved chart.
pub async fn handle_delete_user_chart(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath((email, chart_id)): AxumPath<(String, String)>,
) -> Response {
    if !user.is_admin() {
        return forbidden();
    }

    let store = JsonChartStore::for_user(&state.database_root, &email);
    match store.delete(&chart_id) {
        Ok(true) => (StatusCode::OK, "Chart deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Chart not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_resolve() {
        let mut requests = Vec::new();
        push_request(&mut requests, "a@example.com", "I run the team").unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Pending);

        let status = resolve_request(&mut requests, "a@example.com", true).unwrap();
        assert_eq!(status, RequestStatus::Approved);
        assert_eq!(requests[0].status, RequestStatus::Approved);
    }

    #[test]
    fn one_pending_request_per_user() {
        let mut requests = Vec::new();
        push_request(&mut requests, "a@example.com", "first").unwrap();
        assert!(push_request(&mut requests, "a@example.com", "second").is_err());

        // A resolved request does not block a new one
        resolve_request(&mut requests, "a@example.com", false).unwrap();
        push_request(&mut requests, "a@example.com", "third").unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn rejection_leaves_the_request_marked() {
        let mut requests = Vec::new();
        push_request(&mut requests, "a@example.com", "please").unwrap();

        let status = resolve_request(&mut requests, "a@example.com", false).unwrap();
        assert_eq!(status, RequestStatus::Rejected);

        // Nothing pending remains to resolve
        assert!(resolve_request(&mut requests, "a@example.com", true).is_err());
    }

    #[test]
    fn resolving_an_unknown_user_fails() {
        let mut requests = Vec::new();
        assert!(resolve_request(&mut requests, "ghost@example.com", true).is_err());
    }

    fn registered_user(email: &str) -> User {
        User {
            email: email.to_string(),
            username: "someone".to_string(),
            password_hash: "unused".to_string(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn approval_promotes_the_stored_user_to_admin() {
        let mut requests = Vec::new();
        push_request(&mut requests, "a@example.com", "I run the team").unwrap();

        let mut users = HashMap::from([(
            "a@example.com".to_string(),
            registered_user("a@example.com"),
        )]);

        let status = apply_review(&mut requests, &mut users, "a@example.com", true).unwrap();
        assert_eq!(status, RequestStatus::Approved);
        assert_eq!(users["a@example.com"].role, Role::Admin);
    }

    #[test]
    fn rejection_leaves_the_stored_role_untouched() {
        let mut requests = Vec::new();
        push_request(&mut requests, "a@example.com", "please").unwrap();

        let mut users = HashMap::from([(
            "a@example.com".to_string(),
            registered_user("a@example.com"),
        )]);

        let status = apply_review(&mut requests, &mut users, "a@example.com", false).unwrap();
        assert_eq!(status, RequestStatus::Rejected);
        assert_eq!(users["a@example.com"].role, Role::User);
    }

    #[test]
    fn approving_a_request_for_an_unregistered_user_fails() {
        let mut requests = Vec::new();
        push_request(&mut requests, "ghost@example.com", "hello").unwrap();

        let mut users = HashMap::new();
        assert!(apply_review(&mut requests, &mut users, "ghost@example.com", true).is_err());
    }
}
