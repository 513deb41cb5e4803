// src/handlers/leads.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        contact::Contact,
        lead::{Lead, LeadDetails, LeadInput},
    },
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNotePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "客户下周到店")]
    pub note: String,
}

/// Corpo de `get_lead` / `give_up_lead`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LeadRefPayload {
    pub lead: Uuid,
}

// =============================================================================
//  CRUD
// =============================================================================

// POST /api/leads
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = LeadInput,
    responses(
        (status = 201, description = "Lead criado", body = Lead),
        (status = 400, description = "联系方式必填"),
        (status = 409, description = "线索重复")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<LeadInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lead = app_state
        .lead_service
        .create_lead(payload, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do Lead")),
    responses(
        (status = 200, description = "Lead com atributos calculados", body = LeadDetails),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead_details(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetails>, AppError> {
    Ok(Json(app_state.lead_service.lead_details(id).await?))
}

// PUT /api/leads/{id}
#[utoipa::path(
    put,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do Lead")),
    request_body = LeadInput,
    responses(
        (status = 200, description = "Lead atualizado", body = Lead),
        (status = 404, description = "Lead não encontrado"),
        (status = 409, description = "线索重复")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_lead(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeadInput>,
) -> Result<Json<Lead>, AppError> {
    payload.validate()?;

    Ok(Json(app_state.lead_service.update_lead(id, payload).await?))
}

// POST /api/leads/{id}/notes
#[utoipa::path(
    post,
    path = "/api/leads/{id}/notes",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do Lead")),
    request_body = AddNotePayload,
    responses(
        (status = 201, description = "Nota adicionada", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_note(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lead = app_state
        .lead_service
        .add_note(id, &payload.note, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

// POST /api/leads/{id}/contact
#[utoipa::path(
    post,
    path = "/api/leads/{id}/contact",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do Lead")),
    responses(
        (status = 201, description = "Contato criado a partir do Lead", body = Contact),
        (status = 400, description = "线索需要姓名或公司名称"),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let contact = app_state
        .lead_service
        .create_contact(id, &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

// =============================================================================
//  POSSE DO LEAD
// =============================================================================

// POST /api/leads/get_lead
#[utoipa::path(
    post,
    path = "/api/leads/get_lead",
    tag = "Leads",
    request_body = LeadRefPayload,
    responses(
        (status = 200, description = "Lead assumido pelo usuário da sessão", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<LeadRefPayload>,
) -> Result<Json<Lead>, AppError> {
    Ok(Json(
        app_state
            .lead_service
            .get_lead(payload.lead, &user.username)
            .await?,
    ))
}

// POST /api/leads/give_up_lead
#[utoipa::path(
    post,
    path = "/api/leads/give_up_lead",
    tag = "Leads",
    request_body = LeadRefPayload,
    responses(
        (status = 200, description = "Lead devolvido sem responsável", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn give_up_lead(
    State(app_state): State<AppState>,
    Json(payload): Json<LeadRefPayload>,
) -> Result<Json<Lead>, AppError> {
    Ok(Json(app_state.lead_service.give_up_lead(payload.lead).await?))
}
