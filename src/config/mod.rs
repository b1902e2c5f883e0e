use chrono_tz::Tz;
use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub policy: PolicyConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки политики допуска: все настенные часы считаются в этом поясе
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            policy: PolicyConfig {
                timezone: env::var("POLICY_TIMEZONE")
                    .unwrap_or_else(|_| "Asia/Almaty".to_string())
                    .parse()
                    .expect("POLICY_TIMEZONE must be a valid IANA timezone name"),
            },
        }
    }
}
