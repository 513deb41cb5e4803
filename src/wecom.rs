pub mod client;
pub use client::{ContactDirectory, WeComApiClient};
pub mod crypto;
pub use crypto::WeComCrypt;
pub mod error;
pub use error::WeComError;
pub mod event;
pub use event::ExternalContactEvent;
