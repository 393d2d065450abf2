mod network;
mod service;
mod session;

pub use network::bootstrap;
pub use network::{
    AddrFamily, Connection, ErrorClass, Listener, Socket, SocketError, SocketResult,
};
pub use service::{
    global_config, setup_local_tracing, setup_tracing, AppError, AppResult, LogGuard, Relay,
    Server, ServerConfig, Shutdown, GLOBAL_CONFIG,
};
pub use session::{
    user_mode, Session, SessionRegistry, User, UserRef, DEFAULT_USER_LIMIT, MAX_TITLE_LEN, NULL_ID,
};
