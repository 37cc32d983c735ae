// src/api/reports.rs
// Project and employee master report endpoints. The date window defaults to
// the trailing 12 weeks when the caller does not pass one.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::reports::{ProjectMasterReport, ProjectSummaryRow};
use crate::state::AppState;

use super::auth::require_session;
use super::error::{ApiError, ApiResult, IntoApiError, IntoApiErrorOption};

#[derive(Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct EmployeeListEntry {
    pub employee_code: String,
    pub employee_name: String,
}

fn parse_date(value: &str, param: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid '{}' date, expected YYYY-MM-DD", param)))
}

fn resolve_range(params: &DateRangeQuery) -> ApiResult<(NaiveDate, NaiveDate)> {
    let to = match &params.to {
        Some(v) => parse_date(v, "to")?,
        None => Utc::now().date_naive(),
    };
    let from = match &params.from {
        Some(v) => parse_date(v, "from")?,
        None => to - Duration::weeks(12),
    };
    if from > to {
        return Err(ApiError::bad_request("'from' is after 'to'"));
    }
    Ok((from, to))
}

pub async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ProjectSummaryRow>>> {
    require_session(&state, &headers)?;

    let projects = state
        .reports
        .list_projects()
        .await
        .into_api_error("Failed to list projects")?;

    Ok(Json(projects))
}

pub async fn project_master_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Query(params): Query<DateRangeQuery>,
) -> ApiResult<Json<ProjectMasterReport>> {
    let session = require_session(&state, &headers)?;

    let (from, to) = resolve_range(&params)?;
    let report = state
        .reports
        .project_master(&project_id, from, to)
        .await
        .into_api_error("Failed to build project report")?
        .ok_or_not_found("Project not found")?;

    state
        .activity
        .log_query(
            &format!("project master report: {}", project_id),
            Some(&session.username),
            "PREDEFINED",
            "SUCCESS",
        )
        .await;

    Ok(Json(report))
}

pub async fn list_employees_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EmployeeListEntry>>> {
    require_session(&state, &headers)?;

    let employees = state
        .reports
        .list_employees()
        .await
        .into_api_error("Failed to list employees")?
        .into_iter()
        .map(|(employee_code, employee_name)| EmployeeListEntry {
            employee_code,
            employee_name,
        })
        .collect();

    Ok(Json(employees))
}

pub async fn employee_master_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(employee_code): Path<String>,
) -> ApiResult<Json<crate::reports::EmployeeMasterRow>> {
    let session = require_session(&state, &headers)?;

    let report = state
        .reports
        .employee_master(&employee_code)
        .await
        .into_api_error("Failed to build employee report")?
        .ok_or_not_found("Employee not found")?;

    state
        .activity
        .log_query(
            &format!("employee master report: {}", employee_code),
            Some(&session.username),
            "PREDEFINED",
            "SUCCESS",
        )
        .await;

    Ok(Json(report))
}
