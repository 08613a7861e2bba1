use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::config::HierarchyConfig;
use crate::directory::EmployeeDirectory;
use crate::error::{ErrorKind, LibError};
use crate::models::{AssignSupervisorsPayload, EmployeeId};
use crate::operations::HierarchyFacade;

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::SelfReference => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::CycleDetected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpstreamConflict => StatusCode::CONFLICT,
        ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, error = %self.0.source, "hierarchy api request failed");
        } else {
            tracing::warn!(kind = ?self.0.kind, error = %self.0.source, "hierarchy api request rejected");
        }

        (
            status,
            Json(json!({
                "error": {
                    "code": self.0.code,
                    "message": self.0.public,
                    "details": self.0.details,
                }
            })),
        )
            .into_response()
    }
}

pub trait HasDirectory {
    type Directory: EmployeeDirectory + 'static;

    fn directory(&self) -> Arc<Self::Directory>;
}

pub trait HierarchyApp: HasDirectory {
    fn hierarchy_config(&self) -> HierarchyConfig {
        HierarchyConfig::default()
    }
}

fn facade<S>(app: &S) -> HierarchyFacade<Arc<S::Directory>>
where
    S: HierarchyApp,
{
    HierarchyFacade::with_config(app.directory(), app.hierarchy_config())
}

async fn list_employees_handler<S>(State(app): State<S>) -> Result<impl IntoResponse, AppError>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    let employees = facade(&app).list_enriched().await?;
    Ok(Json(employees))
}

async fn ancestor_tree_handler<S>(
    State(app): State<S>,
    Path(employee_id): Path<EmployeeId>,
) -> Result<impl IntoResponse, AppError>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    let tree = facade(&app).get_ancestor_tree(&employee_id).await?;
    Ok(Json(tree))
}

async fn assign_supervisors_handler<S>(
    State(app): State<S>,
    Path(employee_id): Path<EmployeeId>,
    Json(payload): Json<AssignSupervisorsPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    let replacement = facade(&app)
        .assign_supervisors(employee_id, payload.supervisor_ids)
        .await?;
    Ok(Json(replacement))
}

async fn clear_supervisors_handler<S>(
    State(app): State<S>,
    Path(employee_id): Path<EmployeeId>,
) -> Result<impl IntoResponse, AppError>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    facade(&app).clear_supervisors(employee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn violations_handler<S>(State(app): State<S>) -> Result<impl IntoResponse, AppError>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    let violations = facade(&app).audit().await?;
    Ok(Json(violations))
}

pub fn routes<S>() -> Router<S>
where
    S: HierarchyApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /hierarchy/employees [GET]");
    tracing::info!("Registering route /hierarchy/employees/{{employee_id}}/ancestors [GET]");
    tracing::info!("Registering route /hierarchy/employees/{{employee_id}}/supervisors [PUT,DELETE]");
    tracing::info!("Registering route /hierarchy/violations [GET]");

    Router::new()
        .route("/hierarchy/employees", get(list_employees_handler::<S>))
        .route(
            "/hierarchy/employees/{employee_id}/ancestors",
            get(ancestor_tree_handler::<S>),
        )
        .route(
            "/hierarchy/employees/{employee_id}/supervisors",
            axum::routing::put(assign_supervisors_handler::<S>)
                .delete(clear_supervisors_handler::<S>),
        )
        .route("/hierarchy/violations", get(violations_handler::<S>))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::SelfReference), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::CycleDetected),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::UpstreamConflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::UpstreamFailure), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_response_uses_error_status() {
        let response =
            AppError(LibError::self_reference(&EmployeeId::from("b"))).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
