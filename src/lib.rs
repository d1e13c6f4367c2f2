pub mod config;
pub mod context_store;
pub mod error;
pub mod logging;
pub mod providers;
pub mod proxy;
pub mod server;
pub mod translate;

pub use config::RelayConfig;
pub use context_store::ContextStore;
pub use error::{RelayError, Result};
pub use logging::SharedLogger;
pub use proxy::{build_provider, ChatProvider};
pub use server::{build_router, AppState};
