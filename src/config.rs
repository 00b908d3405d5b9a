use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub draw: DrawConfig,
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
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// 与 setWebhook 的 secret_token 一致；为空则不校验
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub api_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            images_dir: default_images_dir(),
            settings_path: default_settings_path(),
        }
    }
}

/// Card allocation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawConfig {
    /// Days before an issued card may be dealt to the same user again.
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: i64,
    /// IANA zone that defines "today" for every user.
    #[serde(default = "default_reference_zone")]
    pub reference_zone: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            cooldown_days: default_cooldown_days(),
            reference_zone: default_reference_zone(),
        }
    }
}

const MAX_COOLDOWN_DAYS: i64 = 3650;

impl DrawConfig {
    /// 冷却为 0 时同一张牌可当天重复抽取，会绕过每日上限
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_COOLDOWN_DAYS).contains(&self.cooldown_days) {
            return Err(format!(
                "draw.cooldown_days must be between 1 and {MAX_COOLDOWN_DAYS}, got {}",
                self.cooldown_days
            ));
        }
        self.zone()?;
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::days(self.cooldown_days)
    }

    pub fn zone(&self) -> Result<Tz, String> {
        self.reference_zone
            .parse::<Tz>()
            .map_err(|e| format!("invalid draw.reference_zone {}: {e}", self.reference_zone))
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

fn default_cooldown_days() -> i64 {
    10
}

fn default_reference_zone() -> String {
    "Europe/Kyiv".to_string()
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("failed to parse {config_path}: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 无配置文件时必须提供数据库 URL
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and config.toml was not found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    telegram: TelegramConfig {
                        bot_token: get_env("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                        api_base_url: get_env("TELEGRAM_API_BASE_URL")
                            .unwrap_or_else(default_api_base_url),
                        webhook_secret: get_env("TELEGRAM_WEBHOOK_SECRET"),
                        request_timeout_secs: get_env_parse(
                            "TELEGRAM_REQUEST_TIMEOUT_SECS",
                            default_request_timeout_secs(),
                        ),
                    },
                    admin: AdminConfig {
                        api_token: get_env("ADMIN_API_TOKEN")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                    },
                    storage: StorageConfig {
                        images_dir: get_env("IMAGES_DIR").unwrap_or_else(default_images_dir),
                        settings_path: get_env("SETTINGS_PATH")
                            .unwrap_or_else(default_settings_path),
                    },
                    draw: DrawConfig {
                        cooldown_days: get_env_parse("DRAW_COOLDOWN_DAYS", default_cooldown_days()),
                        reference_zone: get_env("DRAW_REFERENCE_ZONE")
                            .unwrap_or_else(default_reference_zone),
                    },
                }
            }
            Err(e) => {
                return Err(format!("cannot read config file {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = v;
        }
        if let Ok(v) = env::var("TELEGRAM_API_BASE_URL") {
            config.telegram.api_base_url = v;
        }
        if let Ok(v) = env::var("TELEGRAM_WEBHOOK_SECRET") {
            config.telegram.webhook_secret = Some(v);
        }
        if let Ok(v) = env::var("TELEGRAM_REQUEST_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.telegram.request_timeout_secs = n;
        }
        if let Ok(v) = env::var("ADMIN_API_TOKEN") {
            config.admin.api_token = v;
        }
        if let Ok(v) = env::var("IMAGES_DIR") {
            config.storage.images_dir = v;
        }
        if let Ok(v) = env::var("SETTINGS_PATH") {
            config.storage.settings_path = v;
        }
        if let Ok(v) = env::var("DRAW_COOLDOWN_DAYS")
            && let Ok(n) = v.parse()
        {
            config.draw.cooldown_days = n;
        }
        if let Ok(v) = env::var("DRAW_REFERENCE_ZONE") {
            config.draw.reference_zone = v;
        }

        config.draw.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_take_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            url = "sqlite::memory:"
            max_connections = 1

            [telegram]
            bot_token = "123:abc"

            [admin]
            api_token = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.draw.cooldown_days, 10);
        assert_eq!(config.draw.cooldown(), chrono::Duration::days(10));
        assert_eq!(config.draw.zone().unwrap(), chrono_tz::Europe::Kyiv);
        assert_eq!(config.storage.images_dir, "images");
        assert_eq!(config.storage.settings_path, "settings.json");
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
        assert_eq!(config.telegram.request_timeout_secs, 15);
        assert!(config.telegram.webhook_secret.is_none());
    }

    #[test]
    fn test_invalid_reference_zone_is_rejected() {
        let draw = DrawConfig {
            cooldown_days: 10,
            reference_zone: "Mars/Olympus".to_string(),
        };
        assert!(draw.zone().is_err());
    }

    #[test]
    fn test_cooldown_days_range() {
        let draw = |cooldown_days| DrawConfig {
            cooldown_days,
            reference_zone: default_reference_zone(),
        };
        assert!(draw(10).validate().is_ok());
        assert!(draw(1).validate().is_ok());
        assert!(draw(3650).validate().is_ok());
        assert!(draw(0).validate().is_err());
        assert!(draw(-3).validate().is_err());
        assert!(draw(3651).validate().is_err());
        assert!(draw(i64::MAX).validate().is_err());
    }
}
