use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat};
use tiny_skia::{IntSize, Pixmap};

/// Source formats the tool accepts. GIF is the animated branch of the export
/// pipeline; everything else takes the still path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl SourceFormat {
    pub fn from_image_format(format: ImageFormat) -> Result<Self> {
        match format {
            ImageFormat::Png => Ok(Self::Png),
            ImageFormat::Jpeg => Ok(Self::Jpeg),
            ImageFormat::WebP => Ok(Self::WebP),
            ImageFormat::Gif => Ok(Self::Gif),
            other => bail!(
                "unsupported source format {:?}. Supported: png, jpeg, webp, gif",
                other
            ),
        }
    }

    pub fn is_animated(self) -> bool {
        matches!(self, Self::Gif)
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// The uploaded original: raw bytes, sniffed format, and the first frame
/// decoded to a premultiplied pixmap. Replaced wholesale on re-load.
#[derive(Clone, Debug)]
pub struct SourceMedia {
    pub file_name: String,
    pub format: SourceFormat,
    pub bytes: Vec<u8>,
    pub frame: Pixmap,
}

impl SourceMedia {
    pub fn load(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("source path '{}' has no file name", path.display()))?;

        let bytes = fs::read(path)
            .with_context(|| format!("failed to read source '{}'", path.display()))?;
        let format = image::guess_format(&bytes)
            .with_context(|| format!("failed to sniff format of '{}'", path.display()))?;
        let format = SourceFormat::from_image_format(format)?;

        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode '{}'", path.display()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        let frame = pixmap_from_rgba(decoded.as_raw(), width, height)?;

        Ok(Self {
            file_name,
            format,
            bytes,
            frame,
        })
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    /// Number of frames in the underlying file. Decodes the animation stream
    /// for GIF sources; still formats are a single frame by definition.
    pub fn frame_count(&self) -> Result<u32> {
        if self.format != SourceFormat::Gif {
            return Ok(1);
        }

        let decoder = GifDecoder::new(Cursor::new(self.bytes.as_slice()))
            .context("failed to open gif animation stream")?;
        let mut count = 0_u32;
        for frame in decoder.into_frames() {
            frame.context("failed to decode animation frame")?;
            count += 1;
        }
        Ok(count)
    }
}

/// Decodes an image file into a premultiplied pixmap (mark assets).
pub fn load_image_pixmap(path: &Path) -> Result<Pixmap> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read image '{}'", path.display()))?;
    let decoded = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode image '{}'", path.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    pixmap_from_rgba(decoded.as_raw(), width, height)
}

/// Straight RGBA bytes -> premultiplied pixmap.
pub fn pixmap_from_rgba(data: &[u8], width: u32, height: u32) -> Result<Pixmap> {
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| anyhow!("invalid pixmap dimensions {width}x{height}"))?;
    if data.len() != (width as usize) * (height as usize) * 4 {
        bail!(
            "rgba buffer length {} does not match {width}x{height}",
            data.len()
        );
    }

    let mut premultiplied = Vec::with_capacity(data.len());
    for pixel in data.chunks_exact(4) {
        let alpha = u16::from(pixel[3]);
        premultiplied.push(mul_div255(u16::from(pixel[0]), alpha));
        premultiplied.push(mul_div255(u16::from(pixel[1]), alpha));
        premultiplied.push(mul_div255(u16::from(pixel[2]), alpha));
        premultiplied.push(pixel[3]);
    }

    Pixmap::from_vec(premultiplied, size)
        .ok_or_else(|| anyhow!("failed to build {width}x{height} pixmap"))
}

/// Premultiplied pixmap -> straight RGBA bytes (what encoders expect).
pub fn rgba_from_pixmap(pixmap: &Pixmap) -> Vec<u8> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let straight = pixel.demultiply();
        data.push(straight.red());
        data.push(straight.green());
        data.push(straight.blue());
        data.push(straight.alpha());
    }
    data
}

fn mul_div255(value: u16, alpha: u16) -> u8 {
    ((u32::from(value) * u32::from(alpha) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 120, 200, 255]));
        image.save(&path).expect("png should save");
        path
    }

    #[test]
    fn loads_png_source_with_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = write_png(dir.path(), "photo.png", 20, 12);

        let source = SourceMedia::load(&path).expect("png should load");
        assert_eq!(source.format, SourceFormat::Png);
        assert_eq!((source.width(), source.height()), (20, 12));
        assert_eq!(source.file_name, "photo.png");
        assert_eq!(source.frame_count().expect("count"), 1);
        assert!(!source.format.is_animated());
    }

    #[test]
    fn gif_source_takes_animated_branch() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("anim.gif");
        let image = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
        image
            .save_with_format(&path, ImageFormat::Gif)
            .expect("gif should save");

        let source = SourceMedia::load(&path).expect("gif should load");
        assert_eq!(source.format, SourceFormat::Gif);
        assert!(source.format.is_animated());
        assert_eq!(source.format.mime(), "image/gif");
        assert!(source.frame_count().expect("count") >= 1);
    }

    #[test]
    fn unreadable_source_reports_path() {
        let error = SourceMedia::load(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(format!("{error:#}").contains("photo.png"));
    }

    #[test]
    fn premultiply_round_trips_opaque_pixels() {
        let data = [200_u8, 100, 50, 255, 0, 0, 0, 0];
        let pixmap = pixmap_from_rgba(&data, 2, 1).expect("pixmap should build");
        assert_eq!(rgba_from_pixmap(&pixmap), data.to_vec());
    }

    #[test]
    fn premultiply_scales_translucent_pixels() {
        let data = [255_u8, 255, 255, 128];
        let pixmap = pixmap_from_rgba(&data, 1, 1).expect("pixmap should build");
        let pixel = pixmap.pixels()[0];
        assert_eq!(pixel.alpha(), 128);
        assert_eq!(pixel.red(), 128);
    }

    #[test]
    fn mismatched_buffer_length_is_rejected() {
        assert!(pixmap_from_rgba(&[0, 0, 0], 1, 1).is_err());
    }
}
