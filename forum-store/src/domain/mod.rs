pub mod category;
pub mod community;
pub mod error;
pub mod post;
pub mod reply;
pub mod rewards;
pub mod user;
pub(crate) mod validate;
