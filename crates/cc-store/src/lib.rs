pub mod fsutil;
pub mod json_store;

pub use json_store::{repo_hash, JsonFileStore};
