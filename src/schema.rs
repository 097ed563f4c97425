use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use serde::{de::Error as DeError, Deserialize, Deserializer};

pub const DEFAULT_TEXT: &str = "sigil";
pub const DEFAULT_TEXT_SIZE: f32 = 24.0;
pub const DEFAULT_OPACITY: f32 = 0.5;
pub const DEFAULT_ROTATION_DEGREES: f32 = -30.0;
pub const DEFAULT_GAP: u32 = 150;
pub const DEFAULT_IMAGE_SCALE: f32 = 0.5;

const MIN_TEXT_SIZE: f32 = 1.0;
const MAX_TEXT_SIZE: f32 = 512.0;
const MAX_IMAGE_SCALE: f32 = 64.0;
const MAX_GAP: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkMode {
    Tiled,
    Single,
}

/// The complete description of a requested overlay. Exactly one of the text
/// fields or the image fields is active, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatermarkConfig {
    #[serde(default = "default_kind")]
    pub kind: MarkKind,
    #[serde(default = "default_mode")]
    pub mode: MarkMode,
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_text_color")]
    pub text_color: ColorRgba,
    #[serde(default = "default_text_size")]
    pub text_size: f32,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    #[serde(default = "default_image_scale")]
    pub image_scale: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_rotation")]
    pub rotation_degrees: f32,
    #[serde(default = "default_gap")]
    pub gap: u32,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            mode: default_mode(),
            text: default_text(),
            text_color: default_text_color(),
            text_size: default_text_size(),
            image_path: None,
            image_scale: default_image_scale(),
            opacity: default_opacity(),
            rotation_degrees: default_rotation(),
            gap: default_gap(),
            font_path: None,
        }
    }
}

impl WatermarkConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            bail!("opacity must be within [0, 1], got {}", self.opacity);
        }
        if !self.rotation_degrees.is_finite()
            || !(-180.0..=180.0).contains(&self.rotation_degrees)
        {
            bail!(
                "rotation_degrees must be within [-180, 180], got {}",
                self.rotation_degrees
            );
        }
        if !self.text_size.is_finite()
            || !(MIN_TEXT_SIZE..=MAX_TEXT_SIZE).contains(&self.text_size)
        {
            bail!(
                "text_size must be within [{MIN_TEXT_SIZE}, {MAX_TEXT_SIZE}], got {}",
                self.text_size
            );
        }
        if !self.image_scale.is_finite()
            || self.image_scale <= 0.0
            || self.image_scale > MAX_IMAGE_SCALE
        {
            bail!(
                "image_scale must be within (0, {MAX_IMAGE_SCALE}], got {}",
                self.image_scale
            );
        }
        if self.gap > MAX_GAP {
            bail!("gap must be at most {MAX_GAP}, got {}", self.gap);
        }
        if self.kind == MarkKind::Text && self.text.trim().is_empty() {
            bail!("text must not be empty when kind is 'text'");
        }
        Ok(())
    }
}

/// 8-bit RGBA color, written as `#rrggbb` or `#rrggbbaa` in config documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ColorRgba {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
}

fn hex_color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("hex color pattern is valid")
    })
}

impl FromStr for ColorRgba {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if !hex_color_pattern().is_match(trimmed) {
            bail!("invalid color '{raw}'. Expected #rrggbb or #rrggbbaa");
        }

        let digits = &trimmed[1..];
        let channel = |index: usize| -> Result<u8> {
            u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16)
                .map_err(|_| anyhow!("invalid color '{raw}'"))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(1)?,
            b: channel(2)?,
            a: if digits.len() == 8 { channel(3)? } else { 255 },
        })
    }
}

impl std::fmt::Display for ColorRgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl<'de> Deserialize<'de> for ColorRgba {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

fn default_kind() -> MarkKind {
    MarkKind::Text
}

fn default_mode() -> MarkMode {
    MarkMode::Tiled
}

fn default_text() -> String {
    DEFAULT_TEXT.to_owned()
}

fn default_text_color() -> ColorRgba {
    ColorRgba::WHITE
}

fn default_text_size() -> f32 {
    DEFAULT_TEXT_SIZE
}

fn default_image_scale() -> f32 {
    DEFAULT_IMAGE_SCALE
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_rotation() -> f32 {
    DEFAULT_ROTATION_DEGREES
}

fn default_gap() -> u32 {
    DEFAULT_GAP
}
