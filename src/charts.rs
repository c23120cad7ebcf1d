use crate::app::AppState;
use crate::infer::{ColumnKind, infer_column_type};
use crate::login::AuthUser;
use crate::project::{ChartProjection, project};
use crate::render::ChartRenderer;
use axum::{
    Extension, Json,
    extract::{Path as AxumPath, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Chart variants supported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Scatter,
    Area,
}

/// A saved chart: which upload it reads, which axes, and how to draw it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Generated chart id (UUID v4)
    pub id: String,

    /// Filename of the upload this chart reads from
    pub source: String,

    pub chart_type: ChartType,
    pub x_axis: String,
    pub y_axis: String,
    pub z_axis: Option<String>,
    pub title: String,
    pub theme: String,
    pub show_legend: bool,
    pub show_grid: bool,
}

/// Partial update applied to a saved chart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartPatch {
    pub title: Option<String>,
    pub theme: Option<String>,
    pub chart_type: Option<ChartType>,
    pub show_legend: Option<bool>,
    pub show_grid: Option<bool>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chart storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("chart index corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage interface for saved charts.
///
/// Handlers only see this trait; the backend is swappable (the shipped one
/// is a per-user JSON file, but any key-value store fits).
pub trait ChartStore {
    fn save(&self, config: &ChartConfig) -> Result<(), StoreError>;
    fn load(&self, id: &str) -> Result<Option<ChartConfig>, StoreError>;
    fn list(&self) -> Result<Vec<ChartConfig>, StoreError>;
    fn update(&self, id: &str, patch: &ChartPatch) -> Result<bool, StoreError>;
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Chart store backed by one JSON file per user.
#[derive(Debug, Clone)]
pub struct JsonChartStore {
    path: PathBuf,
}

impl JsonChartStore {
    /// Store for a user's charts under the database root.
    pub fn for_user(root: impl AsRef<Path>, email: &str) -> Self {
        JsonChartStore {
            path: root.as_ref().join(email).join("charts.json"),
        }
    }

    fn read_all(&self) -> Result<Vec<ChartConfig>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_all(&self, charts: &[ChartConfig]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(charts)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ChartStore for JsonChartStore {
    fn save(&self, config: &ChartConfig) -> Result<(), StoreError> {
        let mut charts = self.read_all()?;
        charts.retain(|c| c.id != config.id);
        charts.push(config.clone());
        self.write_all(&charts)
    }

    fn load(&self, id: &str) -> Result<Option<ChartConfig>, StoreError> {
        Ok(self.read_all()?.into_iter().find(|c| c.id == id))
    }

    fn list(&self) -> Result<Vec<ChartConfig>, StoreError> {
        self.read_all()
    }

    fn update(&self, id: &str, patch: &ChartPatch) -> Result<bool, StoreError> {
        let mut charts = self.read_all()?;
        let Some(chart) = charts.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };

        if let Some(title) = &patch.title {
            chart.title = title.clone();
        }
        if let Some(theme) = &patch.theme {
            chart.theme = theme.clone();
        }
        if let Some(chart_type) = patch.chart_type {
            chart.chart_type = chart_type;
        }
        if let Some(show_legend) = patch.show_legend {
            chart.show_legend = show_legend;
        }
        if let Some(show_grid) = patch.show_grid {
            chart.show_grid = show_grid;
        }

        self.write_all(&charts)?;
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut charts = self.read_all()?;
        let before = charts.len();
        charts.retain(|c| c.id != id);

        if charts.len() == before {
            return Ok(false);
        }

        self.write_all(&charts)?;
        Ok(true)
    }
}

// Web handlers

/// Form data for creating a chart from an upload.
#[derive(Debug, Deserialize)]
pub struct CreateChartForm {
    pub source: String,
    pub chart_type: ChartType,
    pub x_axis: String,
    pub y_axis: String,
    #[serde(default)]
    pub z_axis: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_true")]
    pub show_grid: bool,
}

fn default_title() -> String {
    "Chart".to_string()
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CreateChartResponse {
    pub chart: ChartConfig,
    pub projection: ChartProjection,
    /// Set when the chosen Y axis did not infer as numeric; the chart is
    /// still created, but the UI surfaces the warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Create a chart: project the stored upload onto the chosen axes and
/// persist the configuration.
pub async fn handle_create_chart(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    Json(form): Json<CreateChartForm>,
) -> Response {
    let record = match state.ledger.get_upload(&user.email, &form.source) {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::NOT_FOUND, "Upload not found").into_response(),
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let projection = project(
        &record.data,
        &form.x_axis,
        &form.y_axis,
        form.z_axis.as_deref(),
    );

    if projection.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Nothing to chart: pick both an X and a Y column",
        )
            .into_response();
    }

    let warning = if infer_column_type(&form.y_axis, &record.data) != ColumnKind::Number {
        Some(format!(
            "Column '{}' does not look numeric; unparseable values were dropped",
            form.y_axis
        ))
    } else {
        None
    };

    let chart = ChartConfig {
        id: Uuid::new_v4().to_string(),
        source: form.source,
        chart_type: form.chart_type,
        x_axis: form.x_axis,
        y_axis: form.y_axis,
        z_axis: form.z_axis.filter(|z| !z.is_empty()),
        title: form.title,
        theme: form.theme,
        show_legend: form.show_legend,
        show_grid: form.show_grid,
    };

    let store = JsonChartStore::for_user(&state.database_root, &user.email);
    if store.save(&chart).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
    }

    Json(CreateChartResponse {
        chart,
        projection,
        warning,
    })
    .into_response()
}

/// List the current user's saved charts.
pub async fn handle_list_charts(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let store = JsonChartStore::for_user(&state.database_root, &user.email);
    match store.list() {
        Ok(charts) => Json(charts).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Return the saved config plus a fresh projection of its source upload.
pub async fn handle_chart_data(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(chart_id): AxumPath<String>,
) -> Response {
    let (chart, projection) = match load_chart_with_projection(&state, &user.email, &chart_id) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    Json(CreateChartResponse {
        chart,
        projection,
        warning: None,
    })
    .into_response()
}

/// Render a saved chart to PNG.
pub async fn handle_render_chart(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(chart_id): AxumPath<String>,
) -> Response {
    let (chart, projection) = match load_chart_with_projection(&state, &user.email, &chart_id) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    if projection.y_values.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "No numeric values to plot on the Y axis",
        )
            .into_response();
    }

    let renderer = ChartRenderer::new(state.chart_width, state.chart_height);
    match renderer.render(&chart, &projection) {
        Ok(png) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .body(axum::body::Body::from(png))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            log::error!("chart render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render chart").into_response()
        }
    }
}

/// Apply a partial update to a saved chart.
pub async fn handle_update_chart(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(chart_id): AxumPath<String>,
    Json(patch): Json<ChartPatch>,
) -> Response {
    let store = JsonChartStore::for_user(&state.database_root, &user.email);
    match store.update(&chart_id, &patch) {
        Ok(true) => (StatusCode::OK, "Chart updated").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Chart not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Delete a saved chart.
pub async fn handle_delete_chart(
    Extension(user): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    AxumPath(chart_id): AxumPath<String>,
) -> Response {
    let store = JsonChartStore::for_user(&state.database_root, &user.email);
    match store.delete(&chart_id) {
        Ok(true) => (StatusCode::OK, "Chart deleted").into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Chart not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

fn load_chart_with_projection(
    state: &AppState,
    email: &str,
    chart_id: &str,
) -> Result<(ChartConfig, ChartProjection), Response> {
    let store = JsonChartStore::for_user(&state.database_root, email);
    let chart = match store.load(chart_id) {
        Ok(Some(chart)) => chart,
        Ok(None) => return Err((StatusCode::NOT_FOUND, "Chart not found").into_response()),
        Err(_) => return Err((StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()),
    };

    let record = match state.ledger.get_upload(email, &chart.source) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return Err((
                StatusCode::CONFLICT,
                "The upload backing this chart has been deleted",
            )
                .into_response());
        }
        Err(_) => return Err((StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()),
    };

    let projection = project(
        &record.data,
        &chart.x_axis,
        &chart.y_axis,
        chart.z_axis.as_deref(),
    );

    Ok((chart, projection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_chart(id: &str) -> ChartConfig {
        ChartConfig {
            id: id.to_string(),
            source: "sales.xlsx".to_string(),
            chart_type: ChartType::Bar,
            x_axis: "Region".to_string(),
            y_axis: "Sales".to_string(),
            z_axis: None,
            title: "Sales by region".to_string(),
            theme: "light".to_string(),
            show_legend: true,
            show_grid: true,
        }
    }

    #[test]
    fn save_load_list_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonChartStore::for_user(dir.path(), "user@example.com");

        store.save(&sample_chart("c1")).unwrap();
        store.save(&sample_chart("c2")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        let loaded = store.load("c1").unwrap().unwrap();
        assert_eq!(loaded.title, "Sales by region");
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn saving_an_existing_id_replaces_it() {
        let dir = tempdir().unwrap();
        let store = JsonChartStore::for_user(dir.path(), "user@example.com");

        store.save(&sample_chart("c1")).unwrap();
        let mut updated = sample_chart("c1");
        updated.title = "Renamed".to_string();
        store.save(&updated).unwrap();

        let charts = store.list().unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].title, "Renamed");
    }

    #[test]
    fn patch_updates_only_the_given_fields() {
        let dir = tempdir().unwrap();
        let store = JsonChartStore::for_user(dir.path(), "user@example.com");
        store.save(&sample_chart("c1")).unwrap();

        let patch = ChartPatch {
            title: Some("New title".to_string()),
            show_grid: Some(false),
            ..ChartPatch::default()
        };
        assert!(store.update("c1", &patch).unwrap());

        let chart = store.load("c1").unwrap().unwrap();
        assert_eq!(chart.title, "New title");
        assert!(!chart.show_grid);
        // Untouched fields keep their values
        assert_eq!(chart.theme, "light");
        assert!(chart.show_legend);

        assert!(!store.update("missing", &patch).unwrap());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let dir = tempdir().unwrap();
        let store = JsonChartStore::for_user(dir.path(), "user@example.com");
        store.save(&sample_chart("c1")).unwrap();

        assert!(store.delete("c1").unwrap());
        assert!(!store.delete("c1").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn stores_are_scoped_per_user() {
        let dir = tempdir().unwrap();
        let store_a = JsonChartStore::for_user(dir.path(), "a@example.com");
        let store_b = JsonChartStore::for_user(dir.path(), "b@example.com");

        store_a.save(&sample_chart("c1")).unwrap();
        assert!(store_b.list().unwrap().is_empty());
    }
}
