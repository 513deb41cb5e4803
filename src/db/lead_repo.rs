// src/db/lead_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, postgres::PgArguments, query::QueryAs};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::LeadStore,
    models::{
        contact::{Contact, ContactEmail, ContactPhone},
        lead::{Lead, LeadNote, LeadOwnerRow},
    },
};

// A ordem das colunas aqui define os placeholders $1..$33 de INSERT e UPDATE.
const INSERT_LEAD: &str = r#"
    INSERT INTO leads (
        id, lead_name, first_name, last_name, salutation, gender, job_title,
        company_name, email_id, phone, mobile_no, wechat, qq, source, city, state,
        lead_owner, lead_owner_employee, last_lead_owner, latest_note,
        latest_note_created_time, wechat_nickname, external_userid, original_lead,
        commit_time, keyword, search_word, auto_allocation, bd_account,
        product_category, owner, created_at, updated_at
    )
    VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
        $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33
    )
    RETURNING *
"#;

const UPDATE_LEAD: &str = r#"
    UPDATE leads SET
        lead_name = $2, first_name = $3, last_name = $4, salutation = $5, gender = $6,
        job_title = $7, company_name = $8, email_id = $9, phone = $10, mobile_no = $11,
        wechat = $12, qq = $13, source = $14, city = $15, state = $16, lead_owner = $17,
        lead_owner_employee = $18, last_lead_owner = $19, latest_note = $20,
        latest_note_created_time = $21, wechat_nickname = $22, external_userid = $23,
        original_lead = $24, commit_time = $25, keyword = $26, search_word = $27,
        auto_allocation = $28, bd_account = $29, product_category = $30, owner = $31,
        created_at = $32, updated_at = $33
    WHERE id = $1
    RETURNING *
"#;

fn bind_lead<'q>(
    query: QueryAs<'q, Postgres, Lead, PgArguments>,
    lead: &'q Lead,
) -> QueryAs<'q, Postgres, Lead, PgArguments> {
    query
        .bind(lead.id)
        .bind(&lead.lead_name)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.salutation)
        .bind(&lead.gender)
        .bind(&lead.job_title)
        .bind(&lead.company_name)
        .bind(&lead.email_id)
        .bind(&lead.phone)
        .bind(&lead.mobile_no)
        .bind(&lead.wechat)
        .bind(&lead.qq)
        .bind(&lead.source)
        .bind(&lead.city)
        .bind(&lead.state)
        .bind(&lead.lead_owner)
        .bind(lead.lead_owner_employee)
        .bind(&lead.last_lead_owner)
        .bind(&lead.latest_note)
        .bind(lead.latest_note_created_time)
        .bind(&lead.wechat_nickname)
        .bind(&lead.external_userid)
        .bind(lead.original_lead)
        .bind(lead.commit_time)
        .bind(&lead.keyword)
        .bind(&lead.search_word)
        .bind(lead.auto_allocation)
        .bind(&lead.bd_account)
        .bind(&lead.product_category)
        .bind(&lead.owner)
        .bind(lead.created_at)
        .bind(lead.updated_at)
}

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grava a linha + notas dentro de uma transação.
    async fn persist(&self, sql: &str, lead: &Lead) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut saved = bind_lead(sqlx::query_as::<_, Lead>(sql), lead)
            .fetch_one(&mut *tx)
            .await?;

        for note in &lead.notes {
            sqlx::query(
                r#"
                INSERT INTO lead_notes (id, lead_id, note, added_by, added_on)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(note.id)
            .bind(lead.id)
            .bind(&note.note)
            .bind(&note.added_by)
            .bind(note.added_on)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        saved.notes = self.list_notes(saved.id).await?;
        Ok(saved)
    }

    async fn with_notes(&self, lead: Option<Lead>) -> Result<Option<Lead>, AppError> {
        match lead {
            Some(mut lead) => {
                lead.notes = self.list_notes(lead.id).await?;
                Ok(Some(lead))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LeadStore for LeadRepository {
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_notes(lead).await
    }

    async fn find_leads_by_identifiers(
        &self,
        identifiers: &[String],
        exclude: Uuid,
    ) -> Result<Vec<LeadOwnerRow>, AppError> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, LeadOwnerRow>(
            r#"
            SELECT id, lead_owner
            FROM leads
            WHERE id <> $2
            AND (
                phone = ANY($1)
                OR mobile_no = ANY($1)
                OR wechat = ANY($1)
            )
            ORDER BY created_at ASC
            "#,
        )
        .bind(identifiers)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_lead_by_original_lead(&self, original_lead: Uuid) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE original_lead = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(original_lead)
        .fetch_optional(&self.pool)
        .await?;
        self.with_notes(lead).await
    }

    async fn find_lead_by_wechat(&self, wechat: &str) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE wechat = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(wechat)
        .fetch_optional(&self.pool)
        .await?;
        self.with_notes(lead).await
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<Lead, AppError> {
        self.persist(INSERT_LEAD, lead).await
    }

    async fn update_lead(&self, lead: &Lead) -> Result<Lead, AppError> {
        self.persist(UPDATE_LEAD, lead).await
    }

    async fn list_notes(&self, lead_id: Uuid) -> Result<Vec<LeadNote>, AppError> {
        let notes = sqlx::query_as::<_, LeadNote>(
            "SELECT * FROM lead_notes WHERE lead_id = $1 ORDER BY added_on ASC",
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    async fn insert_contact(&self, contact: &Contact) -> Result<Contact, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, first_name, last_name, salutation, gender, designation,
                company_name, wechat, qq, lead, owner, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(contact.id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.salutation)
        .bind(&contact.gender)
        .bind(&contact.designation)
        .bind(&contact.company_name)
        .bind(&contact.wechat)
        .bind(&contact.qq)
        .bind(contact.lead)
        .bind(&contact.owner)
        .bind(contact.created_at)
        .execute(&mut *tx)
        .await?;

        for email in &contact.email_ids {
            sqlx::query(
                "INSERT INTO contact_emails (contact_id, email_id, is_primary) VALUES ($1, $2, $3)",
            )
            .bind(contact.id)
            .bind(&email.email_id)
            .bind(email.is_primary)
            .execute(&mut *tx)
            .await?;
        }

        for phone in &contact.phone_nos {
            sqlx::query(
                r#"
                INSERT INTO contact_phones (contact_id, phone, is_primary_phone, is_primary_mobile_no)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(contact.id)
            .bind(&phone.phone)
            .bind(phone.is_primary_phone)
            .bind(phone.is_primary_mobile_no)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_contact(contact.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Contato {} sumiu após o insert", contact.id).into())
    }

    async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(mut contact) = contact else {
            return Ok(None);
        };

        contact.email_ids = sqlx::query_as::<_, ContactEmail>(
            "SELECT email_id, is_primary FROM contact_emails WHERE contact_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        contact.phone_nos = sqlx::query_as::<_, ContactPhone>(
            r#"
            SELECT phone, is_primary_phone, is_primary_mobile_no
            FROM contact_phones
            WHERE contact_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(contact))
    }
}
