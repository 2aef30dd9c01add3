//! Accounts module - account records pushed by the backend.

mod accounts_model;

pub use accounts_model::{parse_accounts, AccountRecord};
