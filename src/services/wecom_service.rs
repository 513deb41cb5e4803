// src/services/wecom_service.rs

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{UserStore, WeComStore},
    models::{
        lead::Lead,
        wecom::{LeadCreationStep, LeadFromMessageOutcome, OriginalLead, WeComMessage},
    },
    services::lead_service::LeadService,
    wecom::{
        ContactDirectory, ExternalContactEvent, WeComCrypt,
        event::{bd_vid_from_state, state_for_bd_vid},
    },
};

/// Parâmetros de query do callback do WeCom.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub msg_signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    /// Presente apenas no desafio de verificação da URL.
    pub echostr: Option<String>,
}

#[derive(Debug)]
pub enum CallbackReply {
    /// Texto decifrado do `echostr`, devolvido sem alterações.
    Echo(String),
    /// Evento processado (ou descartado); `None` quando nada foi gravado.
    Ack(Option<WeComMessage>),
}

// Falha de um passo do procedimento
struct StepError {
    step: LeadCreationStep,
    reason: String,
}

trait AtStep<T> {
    fn at(self, step: LeadCreationStep) -> Result<T, StepError>;
}

impl<T> AtStep<T> for Result<T, AppError> {
    fn at(self, step: LeadCreationStep) -> Result<T, StepError> {
        self.map_err(|e| StepError {
            step,
            reason: e.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct WeComService {
    crypt: Arc<WeComCrypt>,
    store: Arc<dyn WeComStore>,
    users: Arc<dyn UserStore>,
    leads: LeadService,
    directory: Arc<dyn ContactDirectory>,
    auto_create_lead: bool,
}

impl WeComService {
    pub fn new(
        crypt: Arc<WeComCrypt>,
        store: Arc<dyn WeComStore>,
        users: Arc<dyn UserStore>,
        leads: LeadService,
        directory: Arc<dyn ContactDirectory>,
        auto_create_lead: bool,
    ) -> Self {
        Self {
            crypt,
            store,
            users,
            leads,
            directory,
            auto_create_lead,
        }
    }

    // =========================================================================
    //  1. CALLBACK
    // =========================================================================

    pub async fn handle_callback(
        &self,
        params: &CallbackParams,
        body: &[u8],
        raw_request: &str,
    ) -> Result<CallbackReply, AppError> {
        let signature = params
            .msg_signature
            .as_deref()
            .ok_or(AppError::MissingParameter("msg_signature"))?;
        let timestamp = params
            .timestamp
            .as_deref()
            .ok_or(AppError::MissingParameter("timestamp"))?;
        let nonce = params
            .nonce
            .as_deref()
            .ok_or(AppError::MissingParameter("nonce"))?;

        // Com echostr é o desafio de configuração da URL
        if let Some(echostr) = params.echostr.as_deref() {
            let plain = self.crypt.verify_url(signature, timestamp, nonce, echostr)?;
            tracing::info!("✅ URL de callback do WeCom verificada");
            return Ok(CallbackReply::Echo(plain));
        }

        let xml = self.crypt.decrypt_msg(body, signature, timestamp, nonce)?;
        let event = ExternalContactEvent::parse(&xml)?;
        tracing::debug!("Evento WeCom recebido: {:?}", event);

        let Some(state) = event.baidu_state() else {
            return Ok(CallbackReply::Ack(None));
        };

        let message = self.save_message(&event, raw_request, state).await?;

        // A mensagem já está gravada: o WeCom recebe sucesso mesmo se o procedimento quebrar
        if self.auto_create_lead {
            if let Some(message) = &message {
                if let Err(e) = self.create_lead_for_message(message.id).await {
                    tracing::error!(
                        "🔥 Falha ao criar lead automaticamente para a mensagem {}: {}",
                        message.id,
                        e
                    );
                }
            }
        }

        Ok(CallbackReply::Ack(message))
    }

    /// Grava o evento uma única vez por token de estado. Repetições retornam `None`.
    pub async fn save_message(
        &self,
        event: &ExternalContactEvent,
        raw_request: &str,
        state: &str,
    ) -> Result<Option<WeComMessage>, AppError> {
        if self.store.find_message_by_state(state).await?.is_some() {
            tracing::debug!("Mensagem com estado {} já registrada, ignorando", state);
            return Ok(None);
        }

        let wecom_user_id = event.user_id.clone().unwrap_or_default();
        let user = self
            .users
            .find_user_by_wecom_id(&wecom_user_id)
            .await?
            .map(|u| u.username);

        let error = if user.is_none() {
            Some(format!("User {} cannot be found in the system!", wecom_user_id))
        } else {
            None
        };

        let message = WeComMessage {
            id: Uuid::new_v4(),
            change_type: event.change_type.clone(),
            create_time: event.created_at(),
            user,
            wecom_user_id: event.user_id.clone(),
            external_user_id: event.external_user_id.clone(),
            state: state.to_string(),
            message: serde_json::to_value(event)
                .map_err(|e| anyhow::anyhow!("Falha ao serializar evento: {}", e))?,
            raw_request: raw_request.to_string(),
            error,
            original_lead: None,
            created_at: Utc::now(),
        };

        let inserted = self.store.insert_message(&message).await?;
        match &inserted {
            Some(m) => tracing::info!("📨 Mensagem WeCom {} registrada (estado {})", m.id, m.state),
            None => tracing::debug!("Entrega concorrente do estado {}, ignorando", state),
        }
        Ok(inserted)
    }

    // =========================================================================
    //  2. LEAD A PARTIR DA MENSAGEM
    // =========================================================================

    /// Gatilho manual: acha o lead bruto pelo token da mensagem e roda o procedimento.
    pub async fn create_lead_for_message(&self, message_id: Uuid) -> Result<LeadFromMessageOutcome, AppError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(AppError::MessageNotFound)?;

        if message.original_lead.is_some() {
            return Err(AppError::MessageAlreadyLinked);
        }

        let original_lead = match bd_vid_from_state(&message.state) {
            Some(bd_vid) => self.store.find_unlinked_original_lead(bd_vid).await?,
            None => None,
        };

        self.create_crm_lead_by_message(message, original_lead).await
    }

    /// Quando chega um lead bruto do Baidu, tenta casar com uma mensagem já recebida.
    pub async fn create_qv_crm_lead_by_original_lead(
        &self,
        original_lead: OriginalLead,
    ) -> Result<Option<LeadFromMessageOutcome>, AppError> {
        let Some(bd_vid) = original_lead.bd_vid.as_deref().filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        let state = state_for_bd_vid(bd_vid);
        let Some(message) = self.store.find_message_by_state(&state).await? else {
            return Ok(None);
        };
        if message.original_lead.is_some() {
            return Ok(None);
        }

        self.create_crm_lead_by_message(message, Some(original_lead))
            .await
            .map(Some)
    }

    pub async fn import_original_lead(
        &self,
        mut original_lead: OriginalLead,
    ) -> Result<(OriginalLead, Option<LeadFromMessageOutcome>), AppError> {
        original_lead.crm_lead = None;
        let saved = self.store.insert_original_lead(&original_lead).await?;
        tracing::info!("📥 Lead original {} importado (bd_vid {:?})", saved.id, saved.bd_vid);

        let outcome = self.create_qv_crm_lead_by_original_lead(saved.clone()).await?;

        // Recarrega: o procedimento pode ter preenchido crm_lead
        let saved = self
            .store
            .find_original_lead(saved.id)
            .await?
            .unwrap_or(saved);

        Ok((saved, outcome))
    }

    /// Cria o Lead do CRM para a mensagem. A falha de qualquer passo fica gravada na
    /// mensagem e volta como `Failed`; o que já foi feito não é desfeito.
    pub async fn create_crm_lead_by_message(
        &self,
        mut message: WeComMessage,
        original_lead: Option<OriginalLead>,
    ) -> Result<LeadFromMessageOutcome, AppError> {
        match self.run_lead_procedure(&mut message, original_lead).await {
            Ok(lead) => {
                tracing::info!("🎯 Lead {} criado a partir da mensagem {}", lead.id, message.id);
                Ok(LeadFromMessageOutcome::Created { lead: Box::new(lead) })
            }
            Err(StepError { step, reason }) => {
                tracing::warn!(
                    "⚠️ Falha ao criar lead da mensagem {} no passo {:?}: {}",
                    message.id,
                    step,
                    reason
                );
                message.error = Some(reason.clone());
                self.store.update_message(&message).await?;
                Ok(LeadFromMessageOutcome::Failed { step, reason })
            }
        }
    }

    async fn run_lead_procedure(
        &self,
        message: &mut WeComMessage,
        original_lead: Option<OriginalLead>,
    ) -> Result<Lead, StepError> {
        let mut original = original_lead.ok_or_else(|| StepError {
            step: LeadCreationStep::ResolveOriginalLead,
            reason: "No original lead!".to_string(),
        })?;

        // Os registros criados levam a autoria do dono do lead bruto
        let acting_as = original.owner.clone();

        message.original_lead = Some(original.id);
        *message = self
            .store
            .update_message(message)
            .await
            .at(LeadCreationStep::LinkMessage)?;

        let external_user_id = message.external_user_id.clone().unwrap_or_default();
        let nickname = if external_user_id.is_empty() {
            None
        } else {
            self.directory.external_contact_name(&external_user_id).await
        };

        let lead = self
            .leads
            .get_or_insert_campaign_lead(campaign_lead(&original, &external_user_id, &acting_as))
            .await
            .at(LeadCreationStep::CreateLead)?;

        let owner = message.user.clone().unwrap_or_else(|| original.owner.clone());
        let lead = self
            .assign_owner(lead, &owner, nickname, &external_user_id)
            .await
            .at(LeadCreationStep::AssignOwner)?;

        original.crm_lead = Some(lead.id);
        self.store
            .update_original_lead(&original)
            .await
            .at(LeadCreationStep::LinkOriginalLead)?;

        Ok(lead)
    }

    async fn assign_owner(
        &self,
        mut lead: Lead,
        owner: &str,
        nickname: Option<String>,
        external_user_id: &str,
    ) -> Result<Lead, AppError> {
        let employee = self.users.find_employee_by_user(owner).await?;

        lead.lead_owner_employee = employee.map(|e| e.id);
        lead.lead_owner = Some(owner.to_string());
        lead.wechat_nickname = nickname;
        lead.external_userid = Some(external_user_id.to_string()).filter(|id| !id.is_empty());

        self.leads.save_lead(lead).await
    }
}

/// Campos canônicos de um lead vindo de campanha do Baidu.
fn campaign_lead(original: &OriginalLead, external_user_id: &str, acting_as: &str) -> Lead {
    let mut lead = Lead::new(acting_as);
    lead.lead_name = Some("匿名".to_string());
    lead.source = Some(format!(
        "百度-{}",
        original.flow_channel_name.as_deref().unwrap_or_default()
    ));
    lead.phone = None;
    lead.mobile_no = None;
    lead.wechat = Some(external_user_id.to_string()).filter(|id| !id.is_empty());
    lead.city = original.area.clone();
    lead.state = original.area_province.clone();
    lead.original_lead = Some(original.id);
    lead.commit_time = original.commit_time.or(original.created_datetime);
    lead.keyword = original.keyword.clone();
    lead.search_word = original.search_word.clone();
    lead.auto_allocation = false;
    lead.bd_account = original.employee_baidu_account.clone();
    lead.product_category = original.product_category.clone();
    lead
}
