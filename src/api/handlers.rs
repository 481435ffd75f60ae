use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::api::wire::{
    AssignPayload, AssignResponse, BatchItem, BatchResponse, CandidatePayload, CandidatesPayload,
    CreateTaskPayload, DeviceStatusPayload, EvaluationResponse, ResolvedCandidate, TaskQuery,
    TaskStatusPayload,
};
use crate::api::ApiState;
use crate::assignment::{AssignmentOutcome, AssignmentRecord};
use crate::eligibility::{evaluate, evaluate_batch, Candidate};
use crate::error::{LabError, Result};
use crate::lab::{Device, NewDevice, NewUser, Task, User};
use crate::session::Session;

/// Unwrap a JSON body, turning extractor failures into a structured error.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| LabError::MalformedPayload(e.body_text()))
}

fn query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    params
        .map(|Query(inner)| inner)
        .map_err(|e| LabError::MalformedPayload(e.body_text()))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn list_tasks(
    State(state): State<ApiState>,
    params: std::result::Result<Query<TaskQuery>, QueryRejection>,
) -> Result<Json<Vec<Task>>> {
    let filter = query(params)?.into_filter()?;
    let catalog = state.catalog.read().await;
    Ok(Json(catalog.tasks(&filter).into_iter().cloned().collect()))
}

pub async fn get_task(State(state): State<ApiState>, Path(id): Path<u64>) -> Result<Json<Task>> {
    let catalog = state.catalog.read().await;
    Ok(Json(catalog.task(id)?.clone()))
}

pub async fn create_task(
    State(state): State<ApiState>,
    session: Session,
    payload: std::result::Result<Json<CreateTaskPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>)> {
    if !session.role.can_assign() {
        return Err(LabError::Forbidden(format!(
            "role {} cannot create tasks",
            session.role
        )));
    }
    let new_task = body(payload)?.into_new_task()?;
    let mut catalog = state.catalog.write().await;
    let task = catalog.create_task(new_task)?.clone();
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn evaluate_task(
    State(state): State<ApiState>,
    Path(task_id): Path<u64>,
    payload: std::result::Result<Json<CandidatePayload>, JsonRejection>,
) -> Result<Json<EvaluationResponse>> {
    let candidate = body(payload)?.resolve()?;
    let catalog = state.catalog.read().await;
    let task = catalog.task(task_id)?;
    let user = catalog.user(candidate.user_id)?;
    let device = catalog.device(candidate.device_id)?;

    let result = evaluate(task, user, device, candidate.window.as_ref())?;
    Ok(Json(EvaluationResponse::new(
        task_id,
        candidate,
        catalog.revision(),
        result,
    )))
}

pub async fn evaluate_candidates(
    State(state): State<ApiState>,
    Path(task_id): Path<u64>,
    payload: std::result::Result<Json<CandidatesPayload>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let resolved = body(payload)?
        .candidates
        .iter()
        .map(CandidatePayload::resolve)
        .collect::<std::result::Result<Vec<ResolvedCandidate>, _>>()?;

    let catalog = state.catalog.read().await;
    let task = catalog.task(task_id)?;
    let mut candidates = Vec::with_capacity(resolved.len());
    for c in &resolved {
        candidates.push(Candidate::new(
            catalog.user(c.user_id)?,
            catalog.device(c.device_id)?,
            c.window,
        ));
    }

    let results = evaluate_batch(task, &candidates)?
        .into_iter()
        .map(|(index, result)| BatchItem {
            index,
            user_id: resolved[index].user_id,
            device_id: resolved[index].device_id,
            result,
        })
        .collect();

    Ok(Json(BatchResponse {
        task_id,
        revision: catalog.revision(),
        results,
    }))
}

pub async fn assign_task(
    State(state): State<ApiState>,
    Path(task_id): Path<u64>,
    session: Session,
    payload: std::result::Result<Json<AssignPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<AssignResponse>)> {
    let request = body(payload)?.into_request(task_id)?;

    let mut catalog = state.catalog.write().await;
    let mut dispatcher = state.dispatcher.write().await;
    match dispatcher.assign(&mut catalog, &session, request)? {
        AssignmentOutcome::Committed(record) => Ok((
            StatusCode::OK,
            Json(AssignResponse {
                assigned: true,
                assignment: Some(record),
                slots: Vec::new(),
            }),
        )),
        AssignmentOutcome::Rejected { slots, .. } => Ok((
            StatusCode::CONFLICT,
            Json(AssignResponse {
                assigned: false,
                assignment: None,
                slots,
            }),
        )),
    }
}

pub async fn get_assignment(
    State(state): State<ApiState>,
    Path(task_id): Path<u64>,
) -> Result<Json<AssignmentRecord>> {
    let dispatcher = state.dispatcher.read().await;
    dispatcher
        .record(task_id)
        .cloned()
        .map(Json)
        .ok_or(LabError::AssignmentNotFound(task_id))
}

pub async fn update_task_status(
    State(state): State<ApiState>,
    Path(task_id): Path<u64>,
    session: Session,
    payload: std::result::Result<Json<TaskStatusPayload>, JsonRejection>,
) -> Result<Json<Task>> {
    let next = body(payload)?.parse()?;
    let mut catalog = state.catalog.write().await;
    let mut dispatcher = state.dispatcher.write().await;
    let task = dispatcher.update_status(&mut catalog, &session, task_id, next)?;
    Ok(Json(task))
}

pub async fn my_tasks(State(state): State<ApiState>, session: Session) -> Json<Vec<Task>> {
    let catalog = state.catalog.read().await;
    Json(
        catalog
            .tasks_for_user(session.user_id)
            .into_iter()
            .cloned()
            .collect(),
    )
}

pub async fn list_users(State(state): State<ApiState>) -> Json<Vec<User>> {
    let catalog = state.catalog.read().await;
    Json(catalog.users().into_iter().cloned().collect())
}

pub async fn create_user(
    State(state): State<ApiState>,
    session: Session,
    payload: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    if !session.role.can_manage_users() {
        return Err(LabError::Forbidden(format!(
            "role {} cannot create users",
            session.role
        )));
    }
    let new_user = body(payload)?;
    let mut catalog = state.catalog.write().await;
    let user = catalog.create_user(new_user)?.clone();
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_devices(State(state): State<ApiState>) -> Json<Vec<Device>> {
    let catalog = state.catalog.read().await;
    Json(catalog.devices().into_iter().cloned().collect())
}

pub async fn create_device(
    State(state): State<ApiState>,
    session: Session,
    payload: std::result::Result<Json<NewDevice>, JsonRejection>,
) -> Result<(StatusCode, Json<Device>)> {
    if !session.role.can_manage_devices() {
        return Err(LabError::Forbidden(format!(
            "role {} cannot create devices",
            session.role
        )));
    }
    let new_device = body(payload)?;
    let mut catalog = state.catalog.write().await;
    let device = catalog.create_device(new_device)?.clone();
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn update_device_status(
    State(state): State<ApiState>,
    Path(device_id): Path<u64>,
    session: Session,
    payload: std::result::Result<Json<DeviceStatusPayload>, JsonRejection>,
) -> Result<Json<Device>> {
    if !session.role.can_manage_devices() {
        return Err(LabError::Forbidden(format!(
            "role {} cannot change device status",
            session.role
        )));
    }
    let status = body(payload)?.status;
    let mut catalog = state.catalog.write().await;
    let device = catalog.set_device_status(device_id, status)?.clone();
    Ok(Json(device))
}

pub async fn list_assignments(State(state): State<ApiState>) -> Json<Vec<AssignmentRecord>> {
    let dispatcher = state.dispatcher.read().await;
    Json(dispatcher.records().into_iter().cloned().collect())
}
