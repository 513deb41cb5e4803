// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::create_employee,

        // --- Leads ---
        handlers::leads::create_lead,
        handlers::leads::get_lead_details,
        handlers::leads::update_lead,
        handlers::leads::add_note,
        handlers::leads::create_contact,
        handlers::leads::get_lead,
        handlers::leads::give_up_lead,

        // --- WeCom ---
        handlers::wecom::callback,
        handlers::wecom::create_lead_from_message,
        handlers::wecom::import_original_lead,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::Employee,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::CreateEmployeePayload,
            models::auth::AuthResponse,

            // --- Leads ---
            models::lead::Lead,
            models::lead::LeadNote,
            models::lead::LeadDetails,
            models::lead::LeadInput,
            models::lead::DuplicateLead,
            models::contact::Contact,
            models::contact::ContactEmail,
            models::contact::ContactPhone,
            handlers::leads::AddNotePayload,
            handlers::leads::LeadRefPayload,

            // --- WeCom ---
            models::wecom::WeComMessage,
            models::wecom::OriginalLead,
            models::wecom::LeadCreationStep,
            models::wecom::LeadFromMessageOutcome,
            handlers::wecom::ImportOriginalLeadPayload,
            handlers::wecom::ImportOriginalLeadResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Funcionários"),
        (name = "Leads", description = "Leads do CRM, notas e conversão em Contato"),
        (name = "WeCom", description = "Callback do WeCom e leads de campanha")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
