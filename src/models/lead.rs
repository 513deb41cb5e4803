// src/models/lead.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- LEAD (O Dado principal do CRM) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,

    // Nome
    pub lead_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub salutation: Option<String>,
    pub gender: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub email_id: Option<String>,

    // Canais de contato (pelo menos um é obrigatório)
    pub phone: Option<String>,
    pub mobile_no: Option<String>,
    pub wechat: Option<String>,
    pub qq: Option<String>,

    pub source: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    // Responsável (username) e o funcionário vinculado
    pub lead_owner: Option<String>,
    pub lead_owner_employee: Option<Uuid>,
    pub last_lead_owner: Option<String>,

    // Snapshot da última nota do responsável
    pub latest_note: Option<String>,
    pub latest_note_created_time: Option<DateTime<Utc>>,

    // WeCom
    pub wechat_nickname: Option<String>,
    pub external_userid: Option<String>,

    // Atribuição de campanha (Lead bruto)
    pub original_lead: Option<Uuid>,
    pub commit_time: Option<DateTime<Utc>>,
    pub keyword: Option<String>,
    pub search_word: Option<String>,
    pub auto_allocation: bool,
    pub bd_account: Option<String>,
    pub product_category: Option<String>,

    /// Usuário que criou o registro
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Vem da tabela lead_notes, não da linha
    #[sqlx(skip)]
    #[serde(default)]
    pub notes: Vec<LeadNote>,
}

impl Lead {
    pub fn new(owner: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            lead_name: None,
            first_name: None,
            last_name: None,
            salutation: None,
            gender: None,
            job_title: None,
            company_name: None,
            email_id: None,
            phone: None,
            mobile_no: None,
            wechat: None,
            qq: None,
            source: None,
            city: None,
            state: None,
            lead_owner: None,
            lead_owner_employee: None,
            last_lead_owner: None,
            latest_note: None,
            latest_note_created_time: None,
            wechat_nickname: None,
            external_userid: None,
            original_lead: None,
            commit_time: None,
            keyword: None,
            search_word: None,
            auto_allocation: true,
            bd_account: None,
            product_category: None,
            owner: owner.to_string(),
            created_at: now,
            updated_at: now,
            notes: Vec::new(),
        }
    }

    /// Nome completo a partir das partes disponíveis.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadNote {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub note: String,
    pub added_by: String,
    pub added_on: DateTime<Utc>,
}

/// Lead conflitante encontrado na checagem de duplicidade.
#[derive(Debug, Clone, FromRow)]
pub struct LeadOwnerRow {
    pub id: Uuid,
    pub lead_owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateLead {
    pub lead: Uuid,
    pub owner_name: String,
    pub url: String,
}

// --- Atributos calculados (somente leitura) ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetails {
    #[serde(flatten)]
    pub lead: Lead,
    pub lead_owner_name: Option<String>,
    pub lead_owner_leader_name: Option<String>,
    pub original_lead_name: Option<Uuid>,
    pub site_url: Option<String>,
    pub call_url: Option<String>,
    pub created_by: Option<String>,
}

// --- Entrada (criação / edição) ---

/// Campos editáveis de um Lead. Só os campos presentes são aplicados.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    pub lead_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub salutation: Option<String>,
    pub gender: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "wei.zhang@example.com")]
    pub email_id: Option<String>,

    #[schema(example = "0571-88886666")]
    pub phone: Option<String>,
    #[schema(example = "13800138000")]
    pub mobile_no: Option<String>,
    #[schema(example = "wxid_zhangwei")]
    pub wechat: Option<String>,
    pub qq: Option<String>,

    pub source: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl LeadInput {
    pub fn apply_to(self, lead: &mut Lead) {
        fn set(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }

        set(&mut lead.lead_name, self.lead_name);
        set(&mut lead.first_name, self.first_name);
        set(&mut lead.last_name, self.last_name);
        set(&mut lead.salutation, self.salutation);
        set(&mut lead.gender, self.gender);
        set(&mut lead.job_title, self.job_title);
        set(&mut lead.company_name, self.company_name);
        set(&mut lead.email_id, self.email_id);
        set(&mut lead.phone, self.phone);
        set(&mut lead.mobile_no, self.mobile_no);
        set(&mut lead.wechat, self.wechat);
        set(&mut lead.qq, self.qq);
        set(&mut lead.source, self.source);
        set(&mut lead.city, self.city);
        set(&mut lead.state, self.state);
    }
}
