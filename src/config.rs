// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    db::{LeadRepository, UserRepository, WeComRepository},
    services::{auth::AuthService, lead_service::LeadService, wecom_service::WeComService},
    wecom::{WeComApiClient, WeComCrypt},
};

// Credenciais do aplicativo WeCom
#[derive(Debug, Clone)]
pub struct WeComSettings {
    pub token: String,
    pub encoding_aes_key: String,
    pub corp_id: String,
    pub access_token: String,
    pub api_base: String,
    pub auto_create_lead: bool,
}

impl WeComSettings {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            token: env::var("WECOM_TOKEN").context("WECOM_TOKEN deve ser definido")?,
            encoding_aes_key: env::var("WECOM_ENCODING_AES_KEY")
                .context("WECOM_ENCODING_AES_KEY deve ser definida")?,
            corp_id: env::var("WECOM_CORP_ID").context("WECOM_CORP_ID deve ser definido")?,
            access_token: env::var("WECOM_ACCESS_TOKEN").unwrap_or_default(),
            api_base: env::var("WECOM_API_BASE")
                .unwrap_or_else(|_| "https://qyapi.weixin.qq.com".to_string()),
            auto_create_lead: env::var("WECOM_AUTO_CREATE_LEAD")
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                .unwrap_or(false),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub bind_addr: String,
    pub base_url: String,
    pub auth_service: AuthService,
    pub lead_service: LeadService,
    pub wecom_service: WeComService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let base_url =
            env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let wecom = WeComSettings::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let users = Arc::new(UserRepository::new(db_pool.clone()));
        let leads = Arc::new(LeadRepository::new(db_pool.clone()));
        let messages = Arc::new(WeComRepository::new(db_pool.clone()));

        let crypt = WeComCrypt::new(&wecom.token, &wecom.encoding_aes_key, &wecom.corp_id)
            .context("WECOM_ENCODING_AES_KEY inválida")?;
        let directory = Arc::new(WeComApiClient::new(&wecom.api_base, &wecom.access_token));

        let auth_service = AuthService::new(users.clone(), jwt_secret);
        let lead_service = LeadService::new(leads, users.clone(), messages.clone(), &base_url);
        let wecom_service = WeComService::new(
            Arc::new(crypt),
            messages,
            users,
            lead_service.clone(),
            directory,
            wecom.auto_create_lead,
        );

        if wecom.auto_create_lead {
            tracing::info!("🤖 Criação automática de leads a partir do callback ativada");
        }

        Ok(Self {
            db_pool,
            bind_addr,
            base_url,
            auth_service,
            lead_service,
            wecom_service,
        })
    }
}
