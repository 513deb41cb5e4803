// src/handlers/wecom.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::wecom::{LeadFromMessageOutcome, OriginalLead},
    services::wecom_service::{CallbackParams, CallbackReply},
};

// =============================================================================
//  ÁREA 1: CALLBACK (público, chamado pelo WeCom)
// =============================================================================

// URL absoluta da requisição, guardada junto da mensagem
fn request_url(base_url: &str, uri: &Uri) -> String {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

// GET|POST /api/wecom/callback
#[utoipa::path(
    post,
    path = "/api/wecom/callback",
    tag = "WeCom",
    params(CallbackParams),
    request_body(content = String, content_type = "text/xml", description = "Envelope XML cifrado"),
    responses(
        (status = 200, description = "echostr decifrado (desafio) ou corpo vazio"),
        (status = 400, description = "Assinatura ou payload inválido")
    )
)]
pub async fn callback(
    State(app_state): State<AppState>,
    Query(params): Query<CallbackParams>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let raw_request = request_url(&app_state.base_url, &uri);

    let reply = app_state
        .wecom_service
        .handle_callback(&params, &body, &raw_request)
        .await?;

    Ok(match reply {
        CallbackReply::Echo(plain) => plain.into_response(),
        CallbackReply::Ack(_) => StatusCode::OK.into_response(),
    })
}

// =============================================================================
//  ÁREA 2: LEAD A PARTIR DA MENSAGEM
// =============================================================================

// POST /api/wecom/messages/{id}/create-lead
#[utoipa::path(
    post,
    path = "/api/wecom/messages/{id}/create-lead",
    tag = "WeCom",
    params(("id" = Uuid, Path, description = "ID da mensagem WeCom")),
    responses(
        (status = 200, description = "Resultado do procedimento", body = LeadFromMessageOutcome),
        (status = 404, description = "Mensagem não encontrada"),
        (status = 409, description = "Mensagem já vinculada a um lead original")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead_from_message(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadFromMessageOutcome>, AppError> {
    Ok(Json(app_state.wecom_service.create_lead_for_message(id).await?))
}

// =============================================================================
//  ÁREA 3: IMPORTAÇÃO DE LEADS BRUTOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportOriginalLeadPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "12345")]
    pub bd_vid: Option<String>,
    #[schema(example = "Search")]
    pub flow_channel_name: Option<String>,
    #[schema(example = "杭州")]
    pub area: Option<String>,
    #[schema(example = "浙江")]
    pub area_province: Option<String>,
    pub commit_time: Option<DateTime<Utc>>,
    pub created_datetime: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub search_word: Option<String>,
    pub employee_baidu_account: Option<String>,
    pub product_category: Option<String>,
    #[validate(url(message = "invalid_url"))]
    pub site_url: Option<String>,
    #[validate(url(message = "invalid_url"))]
    pub return_call_url: Option<String>,
}

impl ImportOriginalLeadPayload {
    fn into_original_lead(self, owner: &str) -> OriginalLead {
        OriginalLead {
            id: Uuid::new_v4(),
            bd_vid: self.bd_vid,
            flow_channel_name: self.flow_channel_name,
            area: self.area,
            area_province: self.area_province,
            commit_time: self.commit_time,
            created_datetime: self.created_datetime,
            keyword: self.keyword,
            search_word: self.search_word,
            employee_baidu_account: self.employee_baidu_account,
            product_category: self.product_category,
            site_url: self.site_url,
            return_call_url: self.return_call_url,
            owner: owner.to_string(),
            crm_lead: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportOriginalLeadResponse {
    pub original_lead: OriginalLead,
    /// Presente quando já havia uma mensagem esperando por este lead.
    pub outcome: Option<LeadFromMessageOutcome>,
}

// POST /api/original-leads
#[utoipa::path(
    post,
    path = "/api/original-leads",
    tag = "WeCom",
    request_body = ImportOriginalLeadPayload,
    responses(
        (status = 201, description = "Lead bruto importado", body = ImportOriginalLeadResponse),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn import_original_lead(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ImportOriginalLeadPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (original_lead, outcome) = app_state
        .wecom_service
        .import_original_lead(payload.into_original_lead(&user.username))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ImportOriginalLeadResponse {
            original_lead,
            outcome,
        }),
    ))
}
