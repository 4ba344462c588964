pub mod backends;
pub mod collection;
pub(crate) mod entities;
pub mod entity_repository;
pub mod kv_backend;
