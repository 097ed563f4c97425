use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::schema::{MarkKind, MarkMode, WatermarkConfig};

pub const OVERRIDE_KEYS: [&str; 11] = [
    "kind",
    "mode",
    "text",
    "text_color",
    "text_size",
    "image_path",
    "image_scale",
    "opacity",
    "rotation_degrees",
    "gap",
    "font_path",
];

pub fn load_and_validate_config(path: &Path) -> Result<WatermarkConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: WatermarkConfig = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;

    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// One `--set key=value` edit, merged into the config before validation.
#[derive(Debug, Clone)]
pub struct ConfigOverride {
    pub key: String,
    pub value: String,
}

impl FromStr for ConfigOverride {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let Some((key, value)) = raw.split_once('=') else {
            bail!("invalid override '{raw}'. Expected key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid override '{raw}'. Key must not be empty");
        }
        Ok(Self {
            key: key.to_owned(),
            value: value.trim().to_owned(),
        })
    }
}

pub fn apply_overrides(config: &mut WatermarkConfig, overrides: &[ConfigOverride]) -> Result<()> {
    for entry in overrides {
        apply_override(config, entry)
            .with_context(|| format!("failed applying override '{}'", entry.key))?;
    }
    config.validate()
}

fn apply_override(config: &mut WatermarkConfig, entry: &ConfigOverride) -> Result<()> {
    let value = entry.value.as_str();
    match entry.key.as_str() {
        "kind" => {
            config.kind = match value {
                "text" => MarkKind::Text,
                "image" => MarkKind::Image,
                other => bail!("unknown kind '{other}'. Supported: text, image"),
            }
        }
        "mode" => {
            config.mode = match value {
                "tiled" => MarkMode::Tiled,
                "single" => MarkMode::Single,
                other => bail!("unknown mode '{other}'. Supported: tiled, single"),
            }
        }
        "text" => config.text = value.to_owned(),
        "text_color" => config.text_color = value.parse()?,
        "text_size" => config.text_size = parse_number(value)?,
        "image_path" => config.image_path = Some(PathBuf::from(value)),
        "image_scale" => config.image_scale = parse_number(value)?,
        "opacity" => config.opacity = parse_number(value)?,
        "rotation_degrees" => config.rotation_degrees = parse_number(value)?,
        "gap" => {
            config.gap = value
                .parse::<u32>()
                .map_err(|_| anyhow!("expected a non-negative integer, got '{value}'"))?
        }
        "font_path" => config.font_path = Some(PathBuf::from(value)),
        other => bail!(
            "unknown config key '{other}'. Supported: {}",
            OVERRIDE_KEYS.join(", ")
        ),
    }
    Ok(())
}

fn parse_number(value: &str) -> Result<f32> {
    value
        .parse::<f32>()
        .map_err(|_| anyhow!("expected a number, got '{value}'"))
}
