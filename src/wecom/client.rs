// src/wecom/client.rs

use async_trait::async_trait;
use serde::Deserialize;

/// Fonte do apelido (nome no WeChat) de um contato externo.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Best-effort: qualquer falha vira `None`.
    async fn external_contact_name(&self, external_user_id: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct ExternalContactResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    external_contact: Option<ExternalContact>,
}

#[derive(Debug, Deserialize)]
struct ExternalContact {
    name: Option<String>,
}

#[derive(Clone)]
pub struct WeComApiClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl WeComApiClient {
    pub fn new(api_base: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    async fn fetch_external_contact(
        &self,
        external_user_id: &str,
    ) -> Result<ExternalContactResponse, reqwest::Error> {
        let url = format!("{}/cgi-bin/externalcontact/get", self.api_base);
        self.http
            .get(url)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("external_userid", external_user_id),
            ])
            .send()
            .await?
            .json::<ExternalContactResponse>()
            .await
    }
}

#[async_trait]
impl ContactDirectory for WeComApiClient {
    async fn external_contact_name(&self, external_user_id: &str) -> Option<String> {
        match self.fetch_external_contact(external_user_id).await {
            Ok(resp) => {
                if resp.errcode != 0 {
                    tracing::warn!(
                        "⚠️ WeCom externalcontact/get retornou {}: {}",
                        resp.errcode,
                        resp.errmsg.unwrap_or_default()
                    );
                }
                resp.external_contact.and_then(|c| c.name)
            }
            Err(e) => {
                tracing::warn!("⚠️ Falha ao buscar apelido do contato externo: {}", e);
                None
            }
        }
    }
}
