use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;
use crate::qr::{ErrorCorrectionLevel, QrOptions, QrService};

#[derive(Clone)]
pub struct GeneratorService {
    qr_service: QrService,
    config: Config,
}

/// Размер приходит числом или строкой ("256", "256px")
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestedSize {
    Number(f64),
    Text(String),
}

impl RequestedSize {
    /// Целая часть значения, как её понимает `parseInt`: ведущее целое,
    /// префикс `0x` означает шестнадцатеричное число
    pub fn parse_int(&self) -> Option<i64> {
        match self {
            RequestedSize::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            RequestedSize::Number(_) => None,
            RequestedSize::Text(s) => {
                let s = s.trim_start();
                let (sign, rest) = match s.strip_prefix('-') {
                    Some(rest) => (-1, rest),
                    None => (1, s.strip_prefix('+').unwrap_or(s)),
                };
                let (radix, digits) = match rest
                    .strip_prefix("0x")
                    .or_else(|| rest.strip_prefix("0X"))
                {
                    Some(hex) => (16, hex),
                    None => (10, rest),
                };
                let end = digits
                    .find(|c: char| !c.is_digit(radix))
                    .unwrap_or(digits.len());
                i64::from_str_radix(&digits[..end], radix)
                    .ok()
                    .map(|n| sign * n)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub text: Option<String>,
    pub size: Option<RequestedSize>,
    pub error_correction_level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    pub qr_data_url: String,
    pub text: String,
    pub size: u32,
}

impl GeneratorService {
    pub fn new(config: Config) -> Self {
        Self {
            qr_service: QrService::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Проверить запрос и собрать опции для кодировщика
    pub fn prepare(&self, request: &GenerationRequest) -> Result<(String, QrOptions), ApiError> {
        let text = match &request.text {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => return Err(ApiError::TextRequired),
        };

        let size = match &request.size {
            Some(requested) => requested.parse_int().ok_or(ApiError::InvalidSize)?,
            None => self.config.qr.default_size as i64,
        };
        let size = u32::try_from(size)
            .ok()
            .filter(|s| self.config.is_size_allowed(*s))
            .ok_or(ApiError::InvalidSize)?;

        let error_correction = match &request.error_correction_level {
            Some(level) => level
                .parse::<ErrorCorrectionLevel>()
                .map_err(|_| ApiError::InvalidErrorCorrectionLevel)?,
            None => ErrorCorrectionLevel::default(),
        };

        let options = QrOptions {
            error_correction,
            width: size,
            margin: self.config.qr.margin,
            dark_color: self.config.qr.dark_color.clone(),
            light_color: self.config.qr.light_color.clone(),
        };

        Ok((text, options))
    }

    /// Сгенерировать QR код по запросу
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ApiError> {
        let (text, options) = self.prepare(request)?;
        self.encode(text, &options)
    }

    pub fn encode(
        &self,
        text: String,
        options: &QrOptions,
    ) -> Result<GenerationResponse, ApiError> {
        let qr_data_url = self.qr_service.generate_qr_code(&text, options)?;

        log::info!(
            "QR code generated: {} chars, {}px, level {}",
            text.chars().count(),
            options.width,
            options.error_correction
        );

        Ok(GenerationResponse {
            success: true,
            qr_data_url,
            text,
            size: options.width,
        })
    }
}
