extern crate config as _;

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

pub static GLOBAL_CONFIG: OnceCell<ServerConfig> = OnceCell::new();
pub fn global_config() -> &'static ServerConfig {
    GLOBAL_CONFIG.get().unwrap()
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
    pub max_connection: usize,
    pub conn_read_buffer_size: usize,
}

/// Settings applied to the session clients land in by default.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    pub default_title: String,
    /// 0 keeps the built-in session default
    pub user_limit: u8,
    pub canvas_width: u16,
    pub canvas_height: u16,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ServerConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;

        Ok(server_config)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_set_up_config() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
            [network]
            ip = "127.0.0.1"
            port = 27750
            max_connection = 64
            conn_read_buffer_size = 4096

            [session]
            default_title = "lobby"
            user_limit = 0
            canvas_width = 800
            canvas_height = 600
            "#
        )
        .unwrap();

        let config = ServerConfig::set_up_config(file.path()).unwrap();
        assert_eq!(config.network.ip, "127.0.0.1");
        assert_eq!(config.network.port, 27750);
        assert_eq!(config.network.max_connection, 64);
        assert_eq!(config.session.default_title, "lobby");
        assert_eq!(config.session.user_limit, 0);
        assert_eq!(config.session.canvas_width, 800);
    }
}
