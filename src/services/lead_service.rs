// src/services/lead_service.rs

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{LeadStore, UserStore, WeComStore},
    models::{
        contact::{Contact, ContactEmail, ContactPhone},
        lead::{DuplicateLead, Lead, LeadDetails, LeadInput, LeadNote},
    },
};

// Um número de telefone digitado no campo de WeChat ainda deve casar com os campos numéricos.
static DIGIT_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

#[derive(Clone)]
pub struct LeadService {
    leads: Arc<dyn LeadStore>,
    users: Arc<dyn UserStore>,
    wecom: Arc<dyn WeComStore>,
    base_url: String,
}

impl LeadService {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        users: Arc<dyn UserStore>,
        wecom: Arc<dyn WeComStore>,
        base_url: &str,
    ) -> Self {
        Self {
            leads,
            users,
            wecom,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    // =========================================================================
    //  PIPELINE DE GRAVAÇÃO
    // =========================================================================

    /// validação de contato -> duplicidade -> snapshots -> insert/update
    pub async fn save_lead(&self, mut lead: Lead) -> Result<Lead, AppError> {
        set_contact_info(&mut lead)?;
        self.validate_single_phone(&lead).await?;
        let exists = self.before_save(&mut lead).await?;

        lead.updated_at = Utc::now();
        if exists {
            self.leads.update_lead(&lead).await
        } else {
            self.leads.insert_lead(&lead).await
        }
    }

    /// Rejeita o lead se outro lead já usa qualquer um dos seus identificadores.
    pub async fn validate_single_phone(&self, lead: &Lead) -> Result<(), AppError> {
        let identifiers = contact_identifiers(lead);
        let rows = self
            .leads
            .find_leads_by_identifiers(&identifiers, lead.id)
            .await?;

        if rows.is_empty() {
            return Ok(());
        }

        let mut conflicts = Vec::with_capacity(rows.len());
        for row in rows {
            let owner_name = match row.lead_owner.as_deref() {
                Some(owner) => self.display_name(owner).await?.unwrap_or_default(),
                None => String::new(),
            };
            conflicts.push(DuplicateLead {
                lead: row.id,
                owner_name,
                url: format!("{}/app/lead/{}", self.base_url, row.id),
            });
        }

        let message = conflicts
            .iter()
            .map(|c| {
                format!(
                    r#"{}: <a href="{}" target="_blank">{}</a>"#,
                    c.owner_name, c.url, c.lead
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        tracing::info!("🚫 Lead {} duplicado ({} conflito(s))", lead.id, conflicts.len());
        Err(AppError::DuplicateLead { message, conflicts })
    }

    /// Snapshot da última nota e do responsável anterior. Retorna se o lead já existe.
    pub async fn before_save(&self, lead: &mut Lead) -> Result<bool, AppError> {
        apply_latest_note(lead);

        let previous = self.leads.find_lead(lead.id).await?;
        lead.last_lead_owner = previous.as_ref().and_then(|p| p.lead_owner.clone());

        Ok(previous.is_some())
    }

    // =========================================================================
    //  OPERAÇÕES
    // =========================================================================

    pub async fn find_lead(&self, id: Uuid) -> Result<Lead, AppError> {
        self.leads.find_lead(id).await?.ok_or(AppError::LeadNotFound)
    }

    /// Cria um lead; o usuário atuante vira criador e, por padrão, responsável.
    pub async fn create_lead(&self, input: LeadInput, acting_as: &str) -> Result<Lead, AppError> {
        let mut lead = Lead::new(acting_as);
        input.apply_to(&mut lead);

        lead.lead_owner = Some(acting_as.to_string());
        lead.lead_owner_employee = self
            .users
            .find_employee_by_user(acting_as)
            .await?
            .map(|e| e.id);

        self.save_lead(lead).await
    }

    pub async fn update_lead(&self, id: Uuid, input: LeadInput) -> Result<Lead, AppError> {
        let mut lead = self.find_lead(id).await?;
        input.apply_to(&mut lead);
        self.save_lead(lead).await
    }

    pub async fn add_note(&self, id: Uuid, note: &str, author: &str) -> Result<Lead, AppError> {
        let mut lead = self.find_lead(id).await?;
        lead.notes.push(LeadNote {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            note: note.to_string(),
            added_by: author.to_string(),
            added_on: Utc::now(),
        });
        self.save_lead(lead).await
    }

    /// Assume o lead para o usuário da sessão (se ele tiver um funcionário vinculado).
    pub async fn get_lead(&self, id: Uuid, session_user: &str) -> Result<Lead, AppError> {
        let mut lead = self.find_lead(id).await?;

        let Some(employee) = self.users.find_employee_by_user(session_user).await? else {
            tracing::info!("Usuário {} sem funcionário vinculado; lead {} não alterado", session_user, id);
            return Ok(lead);
        };

        lead.lead_owner_employee = Some(employee.id);
        lead.lead_owner = Some(session_user.to_string());
        self.save_lead(lead).await
    }

    /// Devolve o lead para o "mar": sem responsável, independente de quem chama.
    pub async fn give_up_lead(&self, id: Uuid) -> Result<Lead, AppError> {
        let mut lead = self.find_lead(id).await?;
        lead.lead_owner_employee = None;
        lead.lead_owner = None;
        self.save_lead(lead).await
    }

    /// Promove o lead a Contato. Sem rollback: qualquer erro sobe como está.
    pub async fn create_contact(&self, id: Uuid, acting_as: &str) -> Result<Contact, AppError> {
        let mut lead = self.find_lead(id).await?;
        if lead.lead_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            resolve_lead_name(&mut lead)?;
        }

        let contact = contact_from_lead(&lead, acting_as);
        let inserted = self.leads.insert_contact(&contact).await?;

        // Recarrega para pegar o que a camada de persistência preencheu
        let contact = self
            .leads
            .find_contact(inserted.id)
            .await?
            .unwrap_or(inserted);

        tracing::info!("📇 Contato {} criado a partir do lead {}", contact.id, lead.id);
        Ok(contact)
    }

    /// Lead + atributos calculados (somente leitura).
    pub async fn lead_details(&self, id: Uuid) -> Result<LeadDetails, AppError> {
        let lead = self.find_lead(id).await?;

        let lead_owner_name = match lead.lead_owner.as_deref() {
            Some(owner) => self.display_name(owner).await?,
            None => None,
        };
        let lead_owner_leader_name = match lead.lead_owner.as_deref() {
            Some(owner) => self.leader_of(owner).await?,
            None => None,
        };
        let created_by = self.display_name(&lead.owner).await?;
        let original = self.wecom.find_original_lead_by_crm_lead(lead.id).await?;

        Ok(LeadDetails {
            lead_owner_name,
            lead_owner_leader_name,
            original_lead_name: original.as_ref().map(|o| o.id),
            site_url: original.as_ref().and_then(|o| o.site_url.clone()),
            call_url: original.as_ref().and_then(|o| o.return_call_url.clone()),
            created_by,
            lead,
        })
    }

    /// Lead já criado para esta campanha, ou um novo a partir do modelo.
    pub async fn get_or_insert_campaign_lead(&self, template: Lead) -> Result<Lead, AppError> {
        if let Some(original_lead) = template.original_lead {
            if let Some(existing) = self.leads.find_lead_by_original_lead(original_lead).await? {
                return Ok(existing);
            }
        }
        if let Some(wechat) = template.wechat.as_deref().filter(|w| !w.is_empty()) {
            if let Some(existing) = self.leads.find_lead_by_wechat(wechat).await? {
                return Ok(existing);
            }
        }
        self.save_lead(template).await
    }

    // --- helpers ---

    async fn display_name(&self, username: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .users
            .find_user(username)
            .await?
            .and_then(|u| u.first_name))
    }

    // user_id do gestor (reports_to) do funcionário do usuário
    async fn leader_of(&self, username: &str) -> Result<Option<String>, AppError> {
        let Some(employee) = self.users.find_employee_by_user(username).await? else {
            return Ok(None);
        };
        let Some(leader_id) = employee.reports_to else {
            return Ok(None);
        };
        Ok(self
            .users
            .find_employee(leader_id)
            .await?
            .and_then(|leader| leader.user_id))
    }
}

// =========================================================================
//  REGRAS PURAS
// =========================================================================

fn strip_whitespace(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|v| !v.is_empty())
}

/// Pelo menos um canal de contato, sem espaços.
pub fn set_contact_info(lead: &mut Lead) -> Result<(), AppError> {
    lead.phone = strip_whitespace(lead.phone.take());
    lead.mobile_no = strip_whitespace(lead.mobile_no.take());
    lead.wechat = strip_whitespace(lead.wechat.take());

    if lead.phone.is_none() && lead.mobile_no.is_none() && lead.wechat.is_none() {
        return Err(AppError::MissingContactInfo);
    }
    Ok(())
}

/// phone, mobile, wechat e as sequências de dígitos dentro do wechat.
pub fn contact_identifiers(lead: &Lead) -> Vec<String> {
    let mut set = BTreeSet::new();
    for value in [&lead.phone, &lead.mobile_no, &lead.wechat].into_iter().flatten() {
        set.insert(value.clone());
    }
    if let Some(wechat) = lead.wechat.as_deref() {
        for m in DIGIT_RUNS.find_iter(wechat) {
            set.insert(m.as_str().to_string());
        }
    }
    set.retain(|v| !v.is_empty());
    set.into_iter().collect()
}

/// Só a nota mais recente conta, e só se foi escrita pelo responsável atual.
pub fn apply_latest_note(lead: &mut Lead) {
    let Some(latest) = lead.notes.iter().max_by_key(|n| n.added_on) else {
        return;
    };
    if lead.lead_owner.as_deref() == Some(latest.added_by.as_str()) {
        lead.latest_note = Some(latest.note.clone());
        lead.latest_note_created_time = Some(latest.added_on);
    }
}

fn resolve_lead_name(lead: &mut Lead) -> Result<(), AppError> {
    let name = lead
        .full_name()
        .or_else(|| lead.company_name.clone().filter(|c| !c.trim().is_empty()))
        .or_else(|| {
            lead.email_id
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .ok_or(AppError::MissingLeadName)?;

    lead.lead_name = Some(name);
    Ok(())
}

fn contact_from_lead(lead: &Lead, owner: &str) -> Contact {
    let mut email_ids = Vec::new();
    if let Some(email) = lead.email_id.as_deref().filter(|e| !e.is_empty()) {
        email_ids.push(ContactEmail {
            email_id: email.to_string(),
            is_primary: true,
        });
    }

    let mut phone_nos = Vec::new();
    if let Some(phone) = lead.phone.as_deref().filter(|p| !p.is_empty()) {
        phone_nos.push(ContactPhone {
            phone: phone.to_string(),
            is_primary_phone: true,
            is_primary_mobile_no: false,
        });
    }
    if let Some(mobile) = lead.mobile_no.as_deref().filter(|m| !m.is_empty()) {
        phone_nos.push(ContactPhone {
            phone: mobile.to_string(),
            is_primary_phone: false,
            is_primary_mobile_no: true,
        });
    }

    Contact {
        id: Uuid::new_v4(),
        first_name: lead.first_name.clone().or_else(|| lead.lead_name.clone()),
        last_name: lead.last_name.clone(),
        salutation: lead.salutation.clone(),
        gender: lead.gender.clone(),
        designation: lead.job_title.clone(),
        company_name: lead.company_name.clone(),
        wechat: lead.wechat.clone(),
        qq: lead.qq.clone(),
        lead: Some(lead.id),
        owner: owner.to_string(),
        created_at: Utc::now(),
        email_ids,
        phone_nos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{self, MemoryStore};
    use chrono::Duration;

    fn service() -> (LeadService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = LeadService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            "https://crm.example.com/",
        );
        (service, store)
    }

    fn lead_with_phone(owner: &str, phone: &str) -> Lead {
        let mut lead = Lead::new(owner);
        lead.lead_name = Some("张三".into());
        lead.phone = Some(phone.into());
        lead.lead_owner = Some(owner.into());
        lead
    }

    fn note(lead: &Lead, author: &str, text: &str, minutes_ago: i64) -> LeadNote {
        LeadNote {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            note: text.into(),
            added_by: author.into(),
            added_on: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn contact_info_is_required() {
        let mut lead = Lead::new("alice");
        lead.phone = Some("   ".into());

        let err = set_contact_info(&mut lead).unwrap_err();
        assert!(matches!(err, AppError::MissingContactInfo));
    }

    #[test]
    fn contact_info_whitespace_is_stripped() {
        let mut lead = Lead::new("alice");
        lead.phone = Some(" 138 0013 8000 ".into());
        lead.wechat = Some("wx id\t01".into());

        set_contact_info(&mut lead).unwrap();
        assert_eq!(lead.phone.as_deref(), Some("13800138000"));
        assert_eq!(lead.wechat.as_deref(), Some("wxid01"));
        assert_eq!(lead.mobile_no, None);
    }

    #[test]
    fn identifiers_include_digit_runs_from_wechat() {
        let mut lead = Lead::new("alice");
        lead.mobile_no = Some("13800138000".into());
        lead.wechat = Some("wx13800138000_66".into());

        assert_eq!(
            contact_identifiers(&lead),
            vec!["13800138000", "66", "wx13800138000_66"]
        );
    }

    #[test]
    fn full_width_digits_in_wechat_are_extracted() {
        let mut lead = Lead::new("alice");
        lead.wechat = Some("微信１３８００１３８０００".into());

        assert_eq!(
            contact_identifiers(&lead),
            vec!["微信１３８００１３８０００", "１３８００１３８０００"]
        );
    }

    #[tokio::test]
    async fn duplicate_is_found_through_digits_in_wechat() {
        let (service, store) = service();
        store.create_user(&memory::user("alice", "Alice", None)).await.unwrap();
        let existing = service
            .save_lead(lead_with_phone("alice", "13800138000"))
            .await
            .unwrap();

        let mut incoming = Lead::new("bob");
        incoming.wechat = Some("wx13800138000".into());

        match service.save_lead(incoming).await.unwrap_err() {
            AppError::DuplicateLead { message, conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].lead, existing.id);
                assert_eq!(conflicts[0].owner_name, "Alice");
                assert_eq!(
                    conflicts[0].url,
                    format!("https://crm.example.com/app/lead/{}", existing.id)
                );
                assert!(message.starts_with("Alice: <a href="));
            }
            other => panic!("esperava DuplicateLead, veio {other:?}"),
        }
        assert_eq!(store.leads().len(), 1);
    }

    #[tokio::test]
    async fn resaving_a_lead_does_not_conflict_with_itself() {
        let (service, _) = service();
        let mut lead = service
            .save_lead(lead_with_phone("alice", "13800138000"))
            .await
            .unwrap();

        lead.city = Some("杭州".into());
        let saved = service.save_lead(lead).await.unwrap();
        assert_eq!(saved.city.as_deref(), Some("杭州"));
    }

    #[test]
    fn latest_note_only_counts_when_written_by_owner() {
        let mut lead = lead_with_phone("alice", "1");
        lead.notes = vec![
            note(&lead, "alice", "ligar amanhã", 30),
            note(&lead, "bob", "cliente sem interesse", 5),
        ];
        apply_latest_note(&mut lead);
        assert_eq!(lead.latest_note, None);

        lead.notes.push(note(&lead, "alice", "visita marcada", 1));
        apply_latest_note(&mut lead);
        assert_eq!(lead.latest_note.as_deref(), Some("visita marcada"));
        assert!(lead.latest_note_created_time.is_some());
    }

    #[tokio::test]
    async fn give_up_clears_owner_and_keeps_last_owner() {
        let (service, store) = service();
        let alice = memory::employee("Alice", "alice", None);
        store.create_employee(&alice).await.unwrap();

        let lead = service
            .create_lead(
                LeadInput {
                    lead_name: Some("张三".into()),
                    mobile_no: Some("13900139000".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(lead.lead_owner_employee, Some(alice.id));
        assert_eq!(lead.last_lead_owner, None);

        let lead = service.give_up_lead(lead.id).await.unwrap();
        assert_eq!(lead.lead_owner, None);
        assert_eq!(lead.lead_owner_employee, None);
        assert_eq!(lead.last_lead_owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn get_lead_requires_an_employee() {
        let (service, store) = service();
        let lead = service
            .save_lead(lead_with_phone("alice", "13800138000"))
            .await
            .unwrap();

        let unchanged = service.get_lead(lead.id, "carol").await.unwrap();
        assert_eq!(unchanged.lead_owner.as_deref(), Some("alice"));

        let carol = memory::employee("Carol", "carol", None);
        store.create_employee(&carol).await.unwrap();
        let claimed = service.get_lead(lead.id, "carol").await.unwrap();
        assert_eq!(claimed.lead_owner.as_deref(), Some("carol"));
        assert_eq!(claimed.lead_owner_employee, Some(carol.id));
        assert_eq!(claimed.last_lead_owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unknown_lead_is_not_found() {
        let (service, _) = service();
        let err = service.give_up_lead(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::LeadNotFound));
    }

    #[tokio::test]
    async fn contact_only_gets_channels_the_lead_has() {
        let (service, _) = service();
        let mut lead = Lead::new("alice");
        lead.company_name = Some("杭州某某装饰".into());
        lead.wechat = Some("wxid_abc".into());
        let lead = service.save_lead(lead).await.unwrap();

        let contact = service.create_contact(lead.id, "alice").await.unwrap();
        assert_eq!(contact.first_name.as_deref(), Some("杭州某某装饰"));
        assert_eq!(contact.wechat.as_deref(), Some("wxid_abc"));
        assert!(contact.email_ids.is_empty());
        assert!(contact.phone_nos.is_empty());
    }

    #[tokio::test]
    async fn contact_marks_primary_phone_and_mobile() {
        let (service, _) = service();
        let mut lead = lead_with_phone("alice", "0571-88886666");
        lead.mobile_no = Some("13800138000".into());
        lead.email_id = Some("zhangsan@example.com".into());
        let lead = service.save_lead(lead).await.unwrap();

        let contact = service.create_contact(lead.id, "alice").await.unwrap();
        assert_eq!(
            contact.email_ids,
            vec![ContactEmail {
                email_id: "zhangsan@example.com".into(),
                is_primary: true
            }]
        );
        assert_eq!(contact.phone_nos.len(), 2);
        assert!(contact.phone_nos[0].is_primary_phone && !contact.phone_nos[0].is_primary_mobile_no);
        assert!(contact.phone_nos[1].is_primary_mobile_no && !contact.phone_nos[1].is_primary_phone);
    }

    #[tokio::test]
    async fn contact_needs_some_name() {
        let (service, _) = service();
        let mut lead = Lead::new("alice");
        lead.wechat = Some("wxid_nameless".into());
        let lead = service.save_lead(lead).await.unwrap();

        let err = service.create_contact(lead.id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::MissingLeadName));
    }

    #[tokio::test]
    async fn details_resolve_owner_and_leader() {
        let (service, store) = service();
        store.create_user(&memory::user("alice", "Alice", None)).await.unwrap();
        store.create_user(&memory::user("boss", "Boss", None)).await.unwrap();
        let boss = memory::employee("Boss", "boss", None);
        store.create_employee(&boss).await.unwrap();
        store
            .create_employee(&memory::employee("Alice", "alice", Some(boss.id)))
            .await
            .unwrap();

        let lead = service
            .save_lead(lead_with_phone("alice", "13800138000"))
            .await
            .unwrap();
        let details = service.lead_details(lead.id).await.unwrap();

        assert_eq!(details.lead_owner_name.as_deref(), Some("Alice"));
        assert_eq!(details.lead_owner_leader_name.as_deref(), Some("boss"));
        assert_eq!(details.created_by.as_deref(), Some("Alice"));
        assert_eq!(details.original_lead_name, None);
    }
}
