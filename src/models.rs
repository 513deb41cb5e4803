pub mod auth;
pub mod contact;
pub mod lead;
pub mod wecom;
