// src/qr.rs
use base64::{engine::general_purpose, Engine as _};
use image::{ImageBuffer, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Пикселей на модуль, когда запрошенная ширина меньше самого символа
const FALLBACK_SCALE: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("encoder error: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("image size overflow: {modules} modules with margin {margin}")]
    Geometry { modules: u32, margin: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCorrectionLevel {
    L,
    M,
    Q,
    H,
}

impl ErrorCorrectionLevel {
    pub const ALL: [ErrorCorrectionLevel; 4] = [Self::L, Self::M, Self::Q, Self::H];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        }
    }
}

impl Default for ErrorCorrectionLevel {
    fn default() -> Self {
        Self::M
    }
}

impl fmt::Display for ErrorCorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCorrectionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::L),
            "m" | "medium" => Ok(Self::M),
            "q" | "quartile" => Ok(Self::Q),
            "h" | "high" => Ok(Self::H),
            _ => Err(format!("Unknown error correction level: {}", s)),
        }
    }
}

impl From<ErrorCorrectionLevel> for EcLevel {
    fn from(level: ErrorCorrectionLevel) -> Self {
        match level {
            ErrorCorrectionLevel::L => EcLevel::L,
            ErrorCorrectionLevel::M => EcLevel::M,
            ErrorCorrectionLevel::Q => EcLevel::Q,
            ErrorCorrectionLevel::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrOptions {
    pub error_correction: ErrorCorrectionLevel,
    /// Ширина итоговой картинки в пикселях
    pub width: u32,
    pub margin: u32,
    pub dark_color: String,
    pub light_color: String,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrectionLevel::M,
            width: 256,
            margin: 1,
            dark_color: "#000000".to_string(),
            light_color: "#FFFFFF".to_string(),
        }
    }
}

/// `#RGB`, `#RRGGBB` или `#RRGGBBAA`
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).chain("ff".chars()).collect(),
        6 => format!("{}ff", hex),
        8 => hex.to_string(),
        _ => return None,
    };

    let mut channels = [0u8; 4];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(Rgba(channels))
}

#[derive(Debug, Clone)]
pub struct QrService;

impl QrService {
    pub fn new() -> Self {
        Self
    }

    /// Генерировать QR код в формате base64 data URL
    pub fn generate_qr_code(&self, data: &str, options: &QrOptions) -> Result<String, QrError> {
        let png_bytes = self.render_png(data, options)?;

        // Кодируем в base64
        let base64_string = general_purpose::STANDARD.encode(&png_bytes);

        Ok(format!("{}{}", PNG_DATA_URL_PREFIX, base64_string))
    }

    pub fn render_png(&self, data: &str, options: &QrOptions) -> Result<Vec<u8>, QrError> {
        let img = self.render_image(data, options)?;
        let (width, height) = img.dimensions();

        // Конвертируем в PNG bytes
        let mut png_bytes = Vec::new();
        {
            use image::codecs::png::PngEncoder;
            use image::ImageEncoder;

            let encoder = PngEncoder::new(&mut png_bytes);
            encoder.write_image(img.as_raw(), width, height, image::ColorType::Rgba8)?;
        }

        Ok(png_bytes)
    }

    pub fn render_image(&self, data: &str, options: &QrOptions) -> Result<RgbaImage, QrError> {
        // Создаем QR код
        let code = QrCode::with_error_correction_level(data, options.error_correction.into())?;

        let dark = parse_hex_color(&options.dark_color)
            .ok_or_else(|| QrError::InvalidColor(options.dark_color.clone()))?;
        let light = parse_hex_color(&options.light_color)
            .ok_or_else(|| QrError::InvalidColor(options.light_color.clone()))?;

        let modules = code.width() as u32;
        let (img_size, scale) = image_geometry(modules, options.margin, options.width)
            .ok_or(QrError::Geometry {
                modules,
                margin: options.margin,
            })?;

        // Заполняем светлым фоном
        let mut img: RgbaImage = ImageBuffer::from_pixel(img_size, img_size, light);

        // Рисуем QR код
        for py in 0..img_size {
            let Some(my) = module_at(py, scale, options.margin, modules) else {
                continue;
            };
            for px in 0..img_size {
                let Some(mx) = module_at(px, scale, options.margin, modules) else {
                    continue;
                };
                if code[(mx, my)] == qrcode::Color::Dark {
                    img.put_pixel(px, py, dark);
                }
            }
        }

        log::debug!(
            "Rendered {}x{} modules into {}px image (scale {:.3})",
            modules,
            modules,
            img_size,
            scale
        );

        Ok(img)
    }
}

/// Размер картинки и масштаб (пикселей на модуль).
/// Запрошенная ширина соблюдается, если в неё помещается хотя бы пиксель на модуль.
/// `None`, если размер не помещается в u32.
fn image_geometry(modules: u32, margin: u32, width: u32) -> Option<(u32, f64)> {
    let total = margin.checked_mul(2)?.checked_add(modules)?;
    if width >= total {
        Some((width, width as f64 / total as f64))
    } else {
        let size = total.checked_mul(FALLBACK_SCALE)?;
        Some((size, FALLBACK_SCALE as f64))
    }
}

fn module_at(pixel: u32, scale: f64, margin: u32, modules: u32) -> Option<usize> {
    let cell = (pixel as f64 / scale).floor() as u32;
    cell.checked_sub(margin)
        .filter(|m| *m < modules)
        .map(|m| m as usize)
}
