pub mod agent;
pub mod capture;
pub mod config;
pub mod confirm;
pub mod context;
pub mod error;
pub mod executor;
pub mod llm;
pub mod logger;
pub mod overlay;
pub mod proxy;
pub mod render;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use config::Settings;
pub use error::ShellmError;
pub use proxy::ShellProxy;
pub use session::Session;
