pub mod catalog;
pub mod token_store;
