pub mod backend;
pub mod clock;
pub(crate) mod ids;
pub mod logging;
pub(crate) mod password;
pub mod settings;
