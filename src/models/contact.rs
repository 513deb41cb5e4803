// src/models/contact.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Cartão de visita derivado de um Lead. Não é sincronizado depois de criado.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub salutation: Option<String>,
    pub gender: Option<String>,
    pub designation: Option<String>,
    pub company_name: Option<String>,
    pub wechat: Option<String>,
    pub qq: Option<String>,
    pub lead: Option<Uuid>,
    pub owner: String,
    pub created_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[serde(default)]
    pub email_ids: Vec<ContactEmail>,
    #[sqlx(skip)]
    #[serde(default)]
    pub phone_nos: Vec<ContactPhone>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactEmail {
    pub email_id: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactPhone {
    pub phone: String,
    pub is_primary_phone: bool,
    pub is_primary_mobile_no: bool,
}
