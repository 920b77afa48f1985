use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::qr::parse_hex_color;

/// Больше поля смысла нет, а картинка растёт квадратично
pub const MAX_MARGIN: u32 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub qr: QrConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    pub default_size: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub size_presets: Vec<u32>,
    /// Поле вокруг символа, в модулях
    pub margin: u32,
    pub dark_color: String,
    pub light_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            qr: QrConfig {
                default_size: 256,
                min_size: 64,
                max_size: 2048,
                size_presets: vec![128, 256, 512, 1024],
                margin: 1,
                dark_color: "#000000".to_string(),
                light_color: "#FFFFFF".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Загружаем из переменных окружения или используем дефолты
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or(defaults.server.host),
                port: parse_or(&lookup, "PORT", defaults.server.port),
            },
            qr: QrConfig {
                default_size: parse_or(&lookup, "QR_DEFAULT_SIZE", defaults.qr.default_size),
                min_size: parse_or(&lookup, "QR_MIN_SIZE", defaults.qr.min_size),
                max_size: parse_or(&lookup, "QR_MAX_SIZE", defaults.qr.max_size),
                size_presets: defaults.qr.size_presets,
                margin: parse_or(&lookup, "QR_MARGIN", defaults.qr.margin),
                dark_color: lookup("QR_DARK_COLOR").unwrap_or(defaults.qr.dark_color),
                light_color: lookup("QR_LIGHT_COLOR").unwrap_or(defaults.qr.light_color),
            },
        };

        // Валидация конфигурации
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let qr = &self.qr;

        if qr.min_size == 0 || qr.min_size > qr.max_size {
            anyhow::bail!(
                "Invalid QR size range: {}..={}",
                qr.min_size,
                qr.max_size
            );
        }

        if !self.is_size_allowed(qr.default_size) {
            anyhow::bail!(
                "Default QR size {} is outside {}..={}",
                qr.default_size,
                qr.min_size,
                qr.max_size
            );
        }

        if let Some(preset) = qr.size_presets.iter().find(|s| !self.is_size_allowed(**s)) {
            anyhow::bail!("Size preset {} is outside the allowed range", preset);
        }

        if qr.margin > MAX_MARGIN {
            anyhow::bail!("QR margin {} exceeds {}", qr.margin, MAX_MARGIN);
        }

        if parse_hex_color(&qr.dark_color).is_none() {
            anyhow::bail!("Invalid QR_DARK_COLOR: {}", qr.dark_color);
        }
        if parse_hex_color(&qr.light_color).is_none() {
            anyhow::bail!("Invalid QR_LIGHT_COLOR: {}", qr.light_color);
        }

        Ok(())
    }

    pub fn is_size_allowed(&self, size: u32) -> bool {
        (self.qr.min_size..=self.qr.max_size).contains(&size)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
