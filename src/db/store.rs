// src/db/store.rs
//
// Contratos de persistência usados pelos serviços. Em produção são implementados
// pelos repositórios sqlx; nos testes, por um store em memória.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Employee, User},
        contact::Contact,
        lead::{Lead, LeadNote, LeadOwnerRow},
        wecom::{OriginalLead, WeComMessage},
    },
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Casa pelo id do WeCom (`wecom_uid`) ou pelo próprio username.
    async fn find_user_by_wecom_id(&self, wecom_user_id: &str) -> Result<Option<User>, AppError>;

    async fn create_user(&self, user: &User) -> Result<User, AppError>;

    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>, AppError>;

    async fn find_employee_by_user(&self, username: &str) -> Result<Option<Employee>, AppError>;

    async fn create_employee(&self, employee: &Employee) -> Result<Employee, AppError>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Carrega o lead com as notas.
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// Leads (exceto `exclude`) cujo phone, mobile_no ou wechat está em `identifiers`.
    async fn find_leads_by_identifiers(
        &self,
        identifiers: &[String],
        exclude: Uuid,
    ) -> Result<Vec<LeadOwnerRow>, AppError>;

    async fn find_lead_by_original_lead(&self, original_lead: Uuid) -> Result<Option<Lead>, AppError>;

    async fn find_lead_by_wechat(&self, wechat: &str) -> Result<Option<Lead>, AppError>;

    /// Grava a linha e as notas novas.
    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, AppError>;

    async fn update_lead(&self, lead: &Lead) -> Result<Lead, AppError>;

    async fn list_notes(&self, lead_id: Uuid) -> Result<Vec<LeadNote>, AppError>;

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, AppError>;

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError>;
}

#[async_trait]
pub trait WeComStore: Send + Sync {
    async fn find_message(&self, id: Uuid) -> Result<Option<WeComMessage>, AppError>;

    async fn find_message_by_state(&self, state: &str) -> Result<Option<WeComMessage>, AppError>;

    /// `None` quando já existe uma mensagem com o mesmo token de estado.
    async fn insert_message(&self, message: &WeComMessage) -> Result<Option<WeComMessage>, AppError>;

    async fn update_message(&self, message: &WeComMessage) -> Result<WeComMessage, AppError>;

    async fn find_original_lead(&self, id: Uuid) -> Result<Option<OriginalLead>, AppError>;

    /// Lead bruto com este bd_vid que ainda não gerou um Lead no CRM.
    async fn find_unlinked_original_lead(&self, bd_vid: &str) -> Result<Option<OriginalLead>, AppError>;

    /// O mais antigo vinculado ao lead do CRM.
    async fn find_original_lead_by_crm_lead(&self, lead_id: Uuid) -> Result<Option<OriginalLead>, AppError>;

    async fn insert_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError>;

    async fn update_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError>;
}
