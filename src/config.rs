use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

/// Which pending order items a new order claims.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimScope {
    /// Every pending item in the system, regardless of owner.
    #[default]
    Global,
    /// Only the pending items that belong to the ordering user.
    Caller,
}

impl std::str::FromStr for ClaimScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(ClaimScope::Global),
            "caller" => Ok(ClaimScope::Caller),
            other => Err(format!("unknown claim scope: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrdersConfig {
    #[serde(default)]
    pub claim_scope: ClaimScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 配置文件不存在时完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL")
                    .map_err(|_| "DATABASE_URL is not set and config.toml was not found")?;
                Self::from_defaults(database_url)
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    pub fn from_defaults(database_url: String) -> Self {
        fn get_env(name: &str) -> Option<String> {
            env::var(name).ok()
        }
        fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<T>().ok())
                .unwrap_or(default)
        }

        Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET")
                    .unwrap_or_else(|| "change-me-in-production".to_string()),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                refresh_token_expires_in: get_env_parse("JWT_REFRESH_EXPIRES_IN", 2_592_000i64),
            },
            twilio: TwilioConfig {
                account_sid: get_env("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                auth_token: get_env("TWILIO_AUTH_TOKEN").unwrap_or_default(),
                from_phone: get_env("TWILIO_FROM_PHONE").unwrap_or_default(),
            },
            orders: OrdersConfig {
                claim_scope: get_env_parse("ORDERS_CLAIM_SCOPE", ClaimScope::Global),
            },
            admin: None,
        }
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = v;
        }
        if let Ok(v) = env::var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = v;
        }
        if let Ok(v) = env::var("TWILIO_FROM_PHONE") {
            self.twilio.from_phone = v;
        }
        if let Ok(v) = env::var("ORDERS_CLAIM_SCOPE") {
            match v.parse() {
                Ok(scope) => self.orders.claim_scope = scope,
                Err(e) => log::warn!("Ignoring ORDERS_CLAIM_SCOPE: {e}"),
            }
        }
        if let (Ok(username), Ok(password)) =
            (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD"))
        {
            self.admin = Some(AdminConfig { username, password });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
url = "postgres://localhost/pizzapoint"
max_connections = 5

[jwt]
secret = "secret"
access_token_expires_in = 60
refresh_token_expires_in = 600

[twilio]
account_sid = "AC123"
auth_token = "token"
from_phone = "+3612345678"
"#;

    #[test]
    fn test_parse_defaults_claim_scope_to_global() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.orders.claim_scope, ClaimScope::Global);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_parse_orders_section() {
        let raw = format!(
            "{SAMPLE}\n[orders]\nclaim_scope = \"caller\"\n\n[admin]\nusername = \"root\"\npassword = \"pw\"\n"
        );
        let config = Config::parse(&raw).unwrap();
        assert_eq!(config.orders.claim_scope, ClaimScope::Caller);
        assert_eq!(config.admin.unwrap().username, "root");
    }

    #[test]
    fn test_claim_scope_from_str() {
        assert_eq!("Global".parse::<ClaimScope>(), Ok(ClaimScope::Global));
        assert_eq!(" caller ".parse::<ClaimScope>(), Ok(ClaimScope::Caller));
        assert!("everyone".parse::<ClaimScope>().is_err());
    }
}
