// src/db/memory.rs
//
// Store em memória usado pelos testes dos serviços. Segue a mesma semântica das
// queries dos repositórios Postgres.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{LeadStore, UserStore, WeComStore},
    models::{
        auth::{Employee, User},
        contact::Contact,
        lead::{Lead, LeadNote, LeadOwnerRow},
        wecom::{OriginalLead, WeComMessage},
    },
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    employees: Vec<Employee>,
    leads: Vec<Lead>,
    contacts: Vec<Contact>,
    messages: Vec<WeComMessage>,
    original_leads: Vec<OriginalLead>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn messages(&self) -> Vec<WeComMessage> {
        self.with(|t| t.messages.clone())
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.with(|t| t.leads.clone())
    }
}

fn matches_any(field: &Option<String>, identifiers: &[String]) -> bool {
    field
        .as_ref()
        .is_some_and(|value| identifiers.iter().any(|i| i == value))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.username == username).cloned()))
    }

    async fn find_user_by_wecom_id(&self, wecom_user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.with(|t| {
            t.users
                .iter()
                .find(|u| u.wecom_uid.as_deref() == Some(wecom_user_id) || u.username == wecom_user_id)
                .cloned()
        }))
    }

    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        self.with(|t| {
            if t.users.iter().any(|u| u.username == user.username) {
                return Err(AppError::UsernameAlreadyExists);
            }
            t.users.push(user.clone());
            Ok(user.clone())
        })
    }

    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>, AppError> {
        Ok(self.with(|t| t.employees.iter().find(|e| e.id == id).cloned()))
    }

    async fn find_employee_by_user(&self, username: &str) -> Result<Option<Employee>, AppError> {
        Ok(self.with(|t| {
            t.employees
                .iter()
                .find(|e| e.user_id.as_deref() == Some(username))
                .cloned()
        }))
    }

    async fn create_employee(&self, employee: &Employee) -> Result<Employee, AppError> {
        self.with(|t| t.employees.push(employee.clone()));
        Ok(employee.clone())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.with(|t| t.leads.iter().find(|l| l.id == id).cloned()))
    }

    async fn find_leads_by_identifiers(
        &self,
        identifiers: &[String],
        exclude: Uuid,
    ) -> Result<Vec<LeadOwnerRow>, AppError> {
        Ok(self.with(|t| {
            t.leads
                .iter()
                .filter(|l| l.id != exclude)
                .filter(|l| {
                    matches_any(&l.phone, identifiers)
                        || matches_any(&l.mobile_no, identifiers)
                        || matches_any(&l.wechat, identifiers)
                })
                .map(|l| LeadOwnerRow {
                    id: l.id,
                    lead_owner: l.lead_owner.clone(),
                })
                .collect()
        }))
    }

    async fn find_lead_by_original_lead(&self, original_lead: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.with(|t| {
            t.leads
                .iter()
                .find(|l| l.original_lead == Some(original_lead))
                .cloned()
        }))
    }

    async fn find_lead_by_wechat(&self, wechat: &str) -> Result<Option<Lead>, AppError> {
        Ok(self.with(|t| t.leads.iter().find(|l| l.wechat.as_deref() == Some(wechat)).cloned()))
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, AppError> {
        self.with(|t| t.leads.push(lead.clone()));
        Ok(lead.clone())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<Lead, AppError> {
        self.with(|t| match t.leads.iter_mut().find(|l| l.id == lead.id) {
            Some(existing) => {
                *existing = lead.clone();
                Ok(lead.clone())
            }
            None => Err(AppError::LeadNotFound),
        })
    }

    async fn list_notes(&self, lead_id: Uuid) -> Result<Vec<LeadNote>, AppError> {
        Ok(self.with(|t| {
            t.leads
                .iter()
                .find(|l| l.id == lead_id)
                .map(|l| l.notes.clone())
                .unwrap_or_default()
        }))
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, AppError> {
        self.with(|t| t.contacts.push(contact.clone()));
        Ok(contact.clone())
    }

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError> {
        Ok(self.with(|t| t.contacts.iter().find(|c| c.id == id).cloned()))
    }
}

#[async_trait]
impl WeComStore for MemoryStore {
    async fn find_message(&self, id: Uuid) -> Result<Option<WeComMessage>, AppError> {
        Ok(self.with(|t| t.messages.iter().find(|m| m.id == id).cloned()))
    }

    async fn find_message_by_state(&self, state: &str) -> Result<Option<WeComMessage>, AppError> {
        Ok(self.with(|t| t.messages.iter().find(|m| m.state == state).cloned()))
    }

    async fn insert_message(&self, message: &WeComMessage) -> Result<Option<WeComMessage>, AppError> {
        Ok(self.with(|t| {
            if t.messages.iter().any(|m| m.state == message.state) {
                return None;
            }
            t.messages.push(message.clone());
            Some(message.clone())
        }))
    }

    async fn update_message(&self, message: &WeComMessage) -> Result<WeComMessage, AppError> {
        self.with(|t| match t.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message.clone();
                Ok(message.clone())
            }
            None => Err(AppError::MessageNotFound),
        })
    }

    async fn find_original_lead(&self, id: Uuid) -> Result<Option<OriginalLead>, AppError> {
        Ok(self.with(|t| t.original_leads.iter().find(|o| o.id == id).cloned()))
    }

    async fn find_unlinked_original_lead(&self, bd_vid: &str) -> Result<Option<OriginalLead>, AppError> {
        Ok(self.with(|t| {
            t.original_leads
                .iter()
                .find(|o| o.bd_vid.as_deref() == Some(bd_vid) && o.crm_lead.is_none())
                .cloned()
        }))
    }

    async fn find_original_lead_by_crm_lead(&self, lead_id: Uuid) -> Result<Option<OriginalLead>, AppError> {
        Ok(self.with(|t| {
            t.original_leads
                .iter()
                .filter(|o| o.crm_lead == Some(lead_id))
                .min_by_key(|o| o.created_at)
                .cloned()
        }))
    }

    async fn insert_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError> {
        self.with(|t| t.original_leads.push(original_lead.clone()));
        Ok(original_lead.clone())
    }

    async fn update_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError> {
        self.with(|t| match t.original_leads.iter_mut().find(|o| o.id == original_lead.id) {
            Some(existing) => {
                *existing = original_lead.clone();
                Ok(original_lead.clone())
            }
            None => Err(AppError::OriginalLeadNotFound),
        })
    }
}

// --- Fixtures ---

pub fn user(username: &str, first_name: &str, wecom_uid: Option<&str>) -> User {
    User {
        username: username.to_string(),
        first_name: Some(first_name.to_string()),
        wecom_uid: wecom_uid.map(str::to_string),
        password_hash: String::new(),
        created_at: chrono::Utc::now(),
    }
}

pub fn employee(name: &str, user_id: &str, reports_to: Option<Uuid>) -> Employee {
    Employee {
        id: Uuid::new_v4(),
        employee_name: name.to_string(),
        user_id: Some(user_id.to_string()),
        reports_to,
        created_at: chrono::Utc::now(),
    }
}

pub fn original_lead(bd_vid: &str, flow_channel_name: &str, owner: &str) -> OriginalLead {
    OriginalLead {
        id: Uuid::new_v4(),
        bd_vid: Some(bd_vid.to_string()),
        flow_channel_name: Some(flow_channel_name.to_string()),
        area: Some("杭州".to_string()),
        area_province: Some("浙江".to_string()),
        commit_time: None,
        created_datetime: Some(chrono::Utc::now()),
        keyword: Some("装修".to_string()),
        search_word: Some("杭州装修公司".to_string()),
        employee_baidu_account: Some("bd-account-01".to_string()),
        product_category: Some("家装".to_string()),
        site_url: Some("https://landing.example.com/a".to_string()),
        return_call_url: None,
        owner: owner.to_string(),
        crm_lead: None,
        created_at: chrono::Utc::now(),
    }
}
