// src/db/wecom_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::WeComStore,
    models::wecom::{OriginalLead, WeComMessage},
};

#[derive(Clone)]
pub struct WeComRepository {
    pool: PgPool,
}

impl WeComRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeComStore for WeComRepository {
    async fn find_message(&self, id: Uuid) -> Result<Option<WeComMessage>, AppError> {
        let message = sqlx::query_as::<_, WeComMessage>("SELECT * FROM wecom_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    async fn find_message_by_state(&self, state: &str) -> Result<Option<WeComMessage>, AppError> {
        let message =
            sqlx::query_as::<_, WeComMessage>("SELECT * FROM wecom_messages WHERE state = $1")
                .bind(state)
                .fetch_optional(&self.pool)
                .await?;
        Ok(message)
    }

    async fn insert_message(&self, message: &WeComMessage) -> Result<Option<WeComMessage>, AppError> {
        // Fora de transação: o registro fica durável assim que o INSERT retorna.
        // O índice único em `state` absorve entregas duplicadas concorrentes.
        let inserted = sqlx::query_as::<_, WeComMessage>(
            r#"
            INSERT INTO wecom_messages (
                id, change_type, create_time, user_name, wecom_user_id,
                external_user_id, state, message, raw_request, error,
                original_lead, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (state) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.change_type)
        .bind(message.create_time)
        .bind(&message.user)
        .bind(&message.wecom_user_id)
        .bind(&message.external_user_id)
        .bind(&message.state)
        .bind(&message.message)
        .bind(&message.raw_request)
        .bind(&message.error)
        .bind(message.original_lead)
        .bind(message.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn update_message(&self, message: &WeComMessage) -> Result<WeComMessage, AppError> {
        let updated = sqlx::query_as::<_, WeComMessage>(
            r#"
            UPDATE wecom_messages
            SET user_name = $2, error = $3, original_lead = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.user)
        .bind(&message.error)
        .bind(message.original_lead)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn find_original_lead(&self, id: Uuid) -> Result<Option<OriginalLead>, AppError> {
        let original = sqlx::query_as::<_, OriginalLead>("SELECT * FROM original_leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(original)
    }

    async fn find_unlinked_original_lead(&self, bd_vid: &str) -> Result<Option<OriginalLead>, AppError> {
        let original = sqlx::query_as::<_, OriginalLead>(
            r#"
            SELECT * FROM original_leads
            WHERE bd_vid = $1 AND crm_lead IS NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(bd_vid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(original)
    }

    async fn find_original_lead_by_crm_lead(&self, lead_id: Uuid) -> Result<Option<OriginalLead>, AppError> {
        let original = sqlx::query_as::<_, OriginalLead>(
            r#"
            SELECT * FROM original_leads
            WHERE crm_lead = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(original)
    }

    async fn insert_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError> {
        let o = original_lead;
        let inserted = sqlx::query_as::<_, OriginalLead>(
            r#"
            INSERT INTO original_leads (
                id, bd_vid, flow_channel_name, area, area_province, commit_time,
                created_datetime, keyword, search_word, employee_baidu_account,
                product_category, site_url, return_call_url, owner, crm_lead, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(o.id)
        .bind(&o.bd_vid)
        .bind(&o.flow_channel_name)
        .bind(&o.area)
        .bind(&o.area_province)
        .bind(o.commit_time)
        .bind(o.created_datetime)
        .bind(&o.keyword)
        .bind(&o.search_word)
        .bind(&o.employee_baidu_account)
        .bind(&o.product_category)
        .bind(&o.site_url)
        .bind(&o.return_call_url)
        .bind(&o.owner)
        .bind(o.crm_lead)
        .bind(o.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn update_original_lead(&self, original_lead: &OriginalLead) -> Result<OriginalLead, AppError> {
        let updated = sqlx::query_as::<_, OriginalLead>(
            "UPDATE original_leads SET crm_lead = $2 WHERE id = $1 RETURNING *",
        )
        .bind(original_lead.id)
        .bind(original_lead.crm_lead)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }
}
