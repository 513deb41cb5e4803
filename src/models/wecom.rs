// src/models/wecom.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::lead::Lead;

// --- WECOM MESSAGE (log idempotente, uma linha por token de estado) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeComMessage {
    pub id: Uuid,
    pub change_type: Option<String>,
    pub create_time: Option<DateTime<Utc>>,

    // "user" é palavra reservada no Postgres
    #[sqlx(rename = "user_name")]
    pub user: Option<String>,

    pub wecom_user_id: Option<String>,
    pub external_user_id: Option<String>,
    pub state: String,

    // Payload decifrado, já estruturado
    pub message: Value,
    pub raw_request: String,
    pub error: Option<String>,
    pub original_lead: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// --- ORIGINAL LEADS (Lead bruto vindo do Baidu) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OriginalLead {
    pub id: Uuid,
    pub bd_vid: Option<String>,
    pub flow_channel_name: Option<String>,
    pub area: Option<String>,
    pub area_province: Option<String>,
    pub commit_time: Option<DateTime<Utc>>,
    pub created_datetime: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub search_word: Option<String>,
    pub employee_baidu_account: Option<String>,
    pub product_category: Option<String>,
    pub site_url: Option<String>,
    pub return_call_url: Option<String>,
    pub owner: String,

    // No máximo um Lead do CRM por Lead bruto
    pub crm_lead: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Passo do procedimento lead-a-partir-da-mensagem em que houve falha.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadCreationStep {
    ResolveOriginalLead,
    LinkMessage,
    CreateLead,
    AssignOwner,
    LinkOriginalLead,
}

/// Resultado tipado do procedimento: quem chama decide o que fazer com a falha.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LeadFromMessageOutcome {
    Created { lead: Box<Lead> },
    Failed { step: LeadCreationStep, reason: String },
}

impl LeadFromMessageOutcome {
    pub fn lead(&self) -> Option<&Lead> {
        match self {
            Self::Created { lead } => Some(lead),
            Self::Failed { .. } => None,
        }
    }
}
