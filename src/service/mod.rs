pub use app_error::{AppError, AppResult};
pub use config::{global_config, NetworkConfig, ServerConfig, SessionConfig, GLOBAL_CONFIG};
pub use relay::Relay;
pub use server::Server;
pub use shutdown::Shutdown;
pub use tracing_config::{setup_local_tracing, setup_tracing, LogGuard};

mod app_error;
mod config;
mod relay;
mod server;
mod shutdown;
mod tracing_config;
