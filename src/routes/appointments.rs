//! HTTP routes for visitor appointments
//!
//! - POST   /api/appointments             - Book (public)
//! - GET    /api/appointments             - List (teachers and admins)
//! - GET    /api/appointments/{id}        - Fetch one
//! - PUT    /api/appointments/{id}/status - Approve, reject or complete
//! - DELETE /api/appointments/{id}        - Remove (admin)

use chrono::NaiveDate;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::common::{
    credentials, error_response, method_not_allowed, not_found, ok, ok_list, ok_message,
    parse_json_body, parse_query_enum, principal, query_params, query_value, segments, BoxBody,
};
use crate::server::AppState;
use crate::services::{AppointmentFilter, BookAppointmentRequest, UpdateStatusRequest};
use crate::types::{GatehouseError, Result};

/// Route `/api/appointments/*`; `None` for other paths
pub async fn handle_appointments_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let segments = segments(&path, "/api/appointments")?;
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, []) => book(req, &state).await,
        (&Method::GET, []) => list(req, &state).await,
        (&Method::GET, [id]) => get(req, &state, id).await,
        (&Method::DELETE, [id]) => delete(req, &state, id).await,
        (&Method::PUT, [id, "status"]) => update_status(req, &state, id).await,

        (_, [] | [_] | [_, "status"]) => return Some(method_not_allowed()),
        _ => return Some(not_found(&path)),
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

async fn book(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: BookAppointmentRequest = parse_json_body(req).await?;
    let appointment = state.services.appointments.book(&principal, body).await?;
    Ok(ok_message(
        StatusCode::CREATED,
        "Appointment request submitted successfully",
        appointment,
    ))
}

async fn list(req: Request<Incoming>, state: &AppState) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let filter = filter_from_query(&query_params(&req))?;
    let appointments = state
        .services
        .appointments
        .list(&principal, filter)
        .await?;
    Ok(ok_list(&appointments))
}

async fn get(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let appointment = state.services.appointments.get(&principal, id).await?;
    Ok(ok(StatusCode::OK, appointment))
}

async fn update_status(
    req: Request<Incoming>,
    state: &AppState,
    id: &str,
) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    let body: UpdateStatusRequest = parse_json_body(req).await?;
    let status = body.status;
    let appointment = state
        .services
        .appointments
        .update_status(&principal, id, body)
        .await?;
    Ok(ok_message(
        StatusCode::OK,
        &format!("Appointment {status} successfully"),
        appointment,
    ))
}

async fn delete(req: Request<Incoming>, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let principal = principal(state, credentials(&req)).await?;
    state.services.appointments.delete(&principal, id).await?;
    Ok(ok_message(
        StatusCode::OK,
        "Appointment deleted successfully",
        json!({ "id": id }),
    ))
}

fn filter_from_query(params: &HashMap<String, String>) -> Result<AppointmentFilter> {
    let date = |key: &str| -> Result<Option<NaiveDate>> {
        query_value(params, key)
            .map(|v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                    GatehouseError::BadRequest(format!("{key} must be YYYY-MM-DD"))
                })
            })
            .transpose()
    };

    Ok(AppointmentFilter {
        status: query_value(params, "status")
            .map(|v| parse_query_enum("status", v))
            .transpose()?,
        appointment_with: query_value(params, "appointmentWith")
            .map(|v| parse_query_enum("appointmentWith", v))
            .transpose()?,
        start_date: date("startDate")?,
        end_date: date("endDate")?,
    })
}
