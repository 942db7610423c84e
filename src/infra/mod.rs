pub mod config;
pub mod logging;
pub mod retry;

pub use config::Timeouts;
pub use retry::with_timeout_retry;
