pub mod auth;
pub mod lead_service;
pub mod wecom_service;
