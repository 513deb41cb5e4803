pub mod store;
pub use store::{LeadStore, UserStore, WeComStore};
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod wecom_repo;
pub use wecom_repo::WeComRepository;

#[cfg(test)]
pub mod memory;
