pub mod memory_backend;
pub mod redis_backend;
