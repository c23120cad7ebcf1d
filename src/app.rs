use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, patch, post},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::charts;
use crate::export;
use crate::flatten::{self, FlattenError};
use crate::infer::{ColumnDescriptor, describe_columns};
use crate::ledger::{UploadLedger, UploadRecord, UploadSummary};
use crate::login::{self, AuthUser};

/// Uploads above this size are rejected before parsing.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state: the upload ledger and chart rendering defaults.
pub struct AppState {
    pub ledger: UploadLedger,
    pub database_root: PathBuf,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl AppState {
    pub fn new(database_root: impl Into<PathBuf>) -> Self {
        let database_root = database_root.into();
        AppState {
            ledger: UploadLedger::with_root(&database_root),
            database_root,
            chart_width: 800,
            chart_height: 600,
        }
    }
}

/// Response body for the upload endpoint.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDescriptor>>,
}

/// Start the web server.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    login::init_database()?;

    let app_state = Arc::new(AppState::new(login::DATABASE_DIR));
    let app = router(app_state);

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    log::info!("listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full route table.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(serve_dashboard))
        .route("/charts", get(serve_charts_page))
        .route("/admin", get(serve_admin_page))
        .route(
            "/api/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/uploads", get(handle_list_uploads))
        .route("/api/uploads/:filename", delete(handle_delete_upload))
        .route("/api/uploads/:filename/columns", get(handle_upload_columns))
        .route("/api/uploads/:filename/export", get(handle_export_upload))
        .route("/api/charts", post(charts::handle_create_chart))
        .route("/api/charts", get(charts::handle_list_charts))
        .route("/api/charts/:id/data", get(charts::handle_chart_data))
        .route("/api/charts/:id/render", get(charts::handle_render_chart))
        .route("/api/charts/:id", patch(charts::handle_update_chart))
        .route("/api/charts/:id", delete(charts::handle_delete_chart))
        .route("/api/admin-request", post(admin::handle_submit_request))
        .route("/api/admin/requests", get(admin::handle_list_requests))
        .route(
            "/api/admin/requests/:email/approve",
            post(admin::handle_approve_request),
        )
        .route(
            "/api/admin/requests/:email/reject",
            post(admin::handle_reject_request),
        )
        .route("/api/admin/users", get(admin::handle_list_users))
        .route("/api/admin/users/:email", delete(admin::handle_delete_user))
        .route(
            "/api/admin/uploads/:email",
            get(admin::handle_list_user_uploads),
        )
        .route(
            "/api/admin/uploads/:email/:filename",
            delete(admin::handle_delete_user_upload),
        )
        .route(
            "/api/admin/charts/:email",
            get(admin::handle_list_user_charts),
        )
        .route(
            "/api/admin/charts/:email/:chart_id",
            delete(admin::handle_delete_user_chart),
        )
        .layer(middleware::from_fn(login::require_auth));

    Router::new()
        .route("/", get(serve_landing))
        .route("/login", get(login::serve_login_page))
        .route("/login", post(login::handle_login))
        .route("/signup", get(login::serve_signup_page))
        .route("/signup", post(login::handle_signup))
        .route("/logout", get(login::handle_logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_landing() -> Redirect {
    Redirect::to("/login")
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn serve_charts_page() -> Html<&'static str> {
    Html(include_str!("./static/charts.html"))
}

async fn serve_admin_page(Extension(user): Extension<AuthUser>) -> Response {
    if !user.is_admin() {
        return (StatusCode::FORBIDDEN, "Admin access required").into_response();
    }
    Html(include_str!("./static/admin.html")).into_response()
}

/// Handle a spreadsheet upload.
///
/// Reads the multipart `file` field, checks the extension, flattens the
/// first sheet, infers column kinds and records the upload against the
/// current user. A duplicate filename is accepted but not persisted again;
/// a parseable workbook with no data rows is reported as empty, not as an
/// error.
pub async fn handle_upload(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut file_data = Vec::new();
    let mut filename = String::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("upload.xlsx").to_string();
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return upload_error(StatusCode::BAD_REQUEST, "No file data received");
    }

    let extension = filename
        .rsplit('.')
        .next()
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    if extension != "xls" && extension != "xlsx" {
        return upload_error(
            StatusCode::BAD_REQUEST,
            "Only .xls and .xlsx files are supported",
        );
    }

    let sheet = match flatten::flatten_objects(&file_data) {
        Ok(sheet) => sheet,
        Err(FlattenError::UnreadableWorkbook(e)) => {
            log::warn!("unreadable upload '{}' from {}: {}", filename, user.email, e);
            return upload_error(
                StatusCode::BAD_REQUEST,
                "Could not read the spreadsheet; check the file format",
            );
        }
    };

    if sheet.is_empty() {
        return Json(UploadResponse {
            status: "empty".to_string(),
            message: Some("No data found in the first sheet".to_string()),
            upload: None,
            columns: None,
        })
        .into_response();
    }

    let columns = describe_columns(&sheet.headers, &sheet.rows);

    if state.ledger.has_uploaded(&user.email, &filename) {
        return duplicate_response(&state, &user.email, &filename, columns);
    }

    let record = UploadRecord {
        uploader_email: user.email.clone(),
        filename: filename.clone(),
        filesize_kb: (file_data.len() / 1024) as u64,
        rows: sheet.rows.len(),
        columns: sheet.headers.len(),
        data: sheet.rows,
        uploaded_at: chrono::Utc::now(),
    };
    let summary = UploadSummary::from(&record);

    match state.ledger.record_upload(&user.email, record) {
        Ok(true) => Json(UploadResponse {
            status: "ok".to_string(),
            message: None,
            upload: Some(summary),
            columns: Some(columns),
        })
        .into_response(),
        Ok(false) => duplicate_response(&state, &user.email, &filename, columns),
        Err(e) => {
            log::error!("failed to record upload for {}: {}", user.email, e);
            upload_error(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

fn upload_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(UploadResponse {
            status: "error".to_string(),
            message: Some(message.to_string()),
            upload: None,
            columns: None,
        }),
    )
        .into_response()
}

fn duplicate_response(
    state: &AppState,
    email: &str,
    filename: &str,
    columns: Vec<ColumnDescriptor>,
) -> Response {
    let existing = state
        .ledger
        .get_upload(email, filename)
        .ok()
        .flatten()
        .as_ref()
        .map(UploadSummary::from);

    Json(UploadResponse {
        status: "duplicate".to_string(),
        message: Some("A file with this name was already uploaded".to_string()),
        upload: existing,
        columns: Some(columns),
    })
    .into_response()
}

/// List the current user's uploads.
pub async fn handle_list_uploads(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.ledger.list_uploads(&user.email) {
        Ok(uploads) => Json(uploads).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Delete one of the current user's uploads.
pub async fn handle_delete_upload(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    match state.ledger.delete_upload(&user.email, &filename) {
        Ok(true) => (StatusCode::OK, "Upload deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Upload not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Column descriptors for a stored upload, for the axis picker.
pub async fn handle_upload_columns(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    let record = match state.ledger.get_upload(&user.email, &filename) {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::NOT_FOUND, "Upload not found").into_response(),
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let headers: Vec<String> = record
        .data
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();

    Json(describe_columns(&headers, &record.data)).into_response()
}

/// Download a stored upload as CSV.
pub async fn handle_export_upload(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    let record = match state.ledger.get_upload(&user.email, &filename) {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::NOT_FOUND, "Upload not found").into_response(),
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let csv = export::to_csv(&record);
    let download_name = csv_download_name(&filename);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download_name),
        )
        .body(axum::body::Body::from(csv))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Download name for an exported upload: the original filename with its
/// last extension swapped for `.csv`.
fn csv_download_name(filename: &str) -> String {
    let stem = std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    format!("{}.csv", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_name_swaps_the_last_extension_for_csv() {
        assert_eq!(csv_download_name("sales.xlsx"), "sales.csv");
        assert_eq!(csv_download_name("report.xls"), "report.csv");
    }

    #[test]
    fn export_name_strips_only_one_extension() {
        assert_eq!(csv_download_name("a.xls.xls"), "a.xls.csv");
        assert_eq!(csv_download_name("q1.backup.xlsx"), "q1.backup.csv");
    }

    #[test]
    fn export_name_handles_a_bare_filename() {
        assert_eq!(csv_download_name("data"), "data.csv");
    }
}
