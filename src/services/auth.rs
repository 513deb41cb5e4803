// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserStore,
    models::auth::{Claims, CreateEmployeePayload, Employee, RegisterUserPayload, User},
};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_secret: String) -> Self {
        Self { users, jwt_secret }
    }

    pub async fn register_user(&self, payload: RegisterUserPayload) -> Result<String, AppError> {
        // Hashing é caro: roda fora do runtime
        let password = payload.password;
        let password_hash = tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let user = User {
            username: payload.username.trim().to_string(),
            first_name: payload.first_name,
            wecom_uid: payload.wecom_uid.filter(|uid| !uid.trim().is_empty()),
            password_hash,
            created_at: Utc::now(),
        };

        let user = self.users.create_user(&user).await?;
        tracing::info!("👤 Usuário {} registrado", user.username);

        self.create_token(&user.username)
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .users
            .find_user(username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password = password.to_owned();
        let password_hash = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.create_token(&user.username)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.users
            .find_user(&token_data.claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn create_employee(&self, payload: CreateEmployeePayload) -> Result<Employee, AppError> {
        if let Some(user_id) = payload.user_id.as_deref() {
            self.users
                .find_user(user_id)
                .await?
                .ok_or(AppError::UserNotFound)?;
        }

        let employee = Employee {
            id: Uuid::new_v4(),
            employee_name: payload.employee_name,
            user_id: payload.user_id,
            reports_to: payload.reports_to,
            created_at: Utc::now(),
        };
        self.users.create_employee(&employee).await
    }

    fn create_token(&self, username: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: username.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
