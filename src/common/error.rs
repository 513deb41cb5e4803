use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::lead::DuplicateLead;
use crate::wecom::WeComError;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // --- Regras do Lead (mensagens vão direto para o usuário) ---
    #[error("联系方式必填")]
    MissingContactInfo,

    #[error("线索需要姓名或公司名称")]
    MissingLeadName,

    #[error("当前已经存在相同联系方式的线索: <b>{message}</b>")]
    DuplicateLead {
        message: String,
        conflicts: Vec<DuplicateLead>,
    },

    // --- Autenticação ---
    #[error("Usuário já existe")]
    UsernameAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    // --- Registros ---
    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Mensagem WeCom não encontrada")]
    MessageNotFound,

    #[error("Lead original não encontrado")]
    OriginalLeadNotFound,

    #[error("Mensagem WeCom já vinculada a um lead original")]
    MessageAlreadyLinked,

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingParameter(&'static str),

    #[error("Erro do WeCom: {0}")]
    WeCom(#[from] WeComError),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::DuplicateLead { ref conflicts, .. } => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "title": "线索重复",
                    "conflicts": conflicts,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::WeCom(ref e) => {
                tracing::warn!("🔒 Callback WeCom rejeitado ({}): {}", e.code(), e);
                let body = Json(json!({ "error": e.to_string(), "code": e.code() }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::MissingContactInfo => (StatusCode::BAD_REQUEST, "联系方式必填".to_string()),
            AppError::MissingLeadName => {
                (StatusCode::BAD_REQUEST, "线索需要姓名或公司名称".to_string())
            }
            AppError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                format!("Parâmetro obrigatório ausente: {}", name),
            ),
            AppError::UsernameAlreadyExists => {
                (StatusCode::CONFLICT, "Este usuário já está em uso.".to_string())
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Usuário ou senha inválidos.".to_string())
            }
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado.".to_string()),
            AppError::LeadNotFound => (StatusCode::NOT_FOUND, "Lead não encontrado.".to_string()),
            AppError::MessageNotFound => {
                (StatusCode::NOT_FOUND, "Mensagem WeCom não encontrada.".to_string())
            }
            AppError::MessageAlreadyLinked => (
                StatusCode::CONFLICT,
                "Esta mensagem já gerou um lead.".to_string(),
            ),
            AppError::OriginalLeadNotFound => {
                (StatusCode::NOT_FOUND, "Lead original não encontrado.".to_string())
            }

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            ref e => {
                tracing::error!("🔥 Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
