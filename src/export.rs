use std::fs;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use sha2::{Digest, Sha256};
use tiny_skia::Pixmap;

use crate::encoder::{
    encode_single_frame_gif, EncoderCell, EncoderSource, EncoderState, GifEncodeJob,
};
use crate::media::{rgba_from_pixmap, SourceFormat};

/// Fixed marker prepended to the source file name.
pub const ARTIFACT_PREFIX: &str = "watermarked_";
pub const JPEG_QUALITY: u8 = 90;

/// Terminal signal of one export, delivered to the controller's thread.
#[derive(Debug, Clone)]
pub enum ExportEvent {
    Finished { path: PathBuf, sha256: String },
    Failed { message: String },
}

/// Read-only snapshot handed to the worker. Nothing here refers back to the
/// session, so config changes during an export cannot affect it.
pub struct ExportRequest {
    pub frame: Pixmap,
    pub format: SourceFormat,
    pub source_file_name: String,
    pub out_dir: PathBuf,
}

/// Still exports encode in-process; animated exports go through the
/// session-cached external encoder. Either way the work happens on a worker
/// thread and every failure is folded into an [`ExportEvent::Failed`].
pub struct ExportPipeline {
    encoder_cell: EncoderCell,
    encoder_source: Arc<dyn EncoderSource>,
}

impl ExportPipeline {
    pub fn new(encoder_source: Arc<dyn EncoderSource>) -> Self {
        Self {
            encoder_cell: EncoderCell::new(),
            encoder_source,
        }
    }

    pub fn encoder_state(&self) -> EncoderState {
        self.encoder_cell.state()
    }

    pub fn spawn(
        &self,
        request: ExportRequest,
        events: mpsc::Sender<ExportEvent>,
    ) -> Result<JoinHandle<()>> {
        let cell = self.encoder_cell.clone();
        let source = Arc::clone(&self.encoder_source);

        thread::Builder::new()
            .name("sigil-export".to_owned())
            .spawn(move || {
                let event = match run_export(&request, &cell, source.as_ref()) {
                    Ok((path, sha256)) => ExportEvent::Finished { path, sha256 },
                    Err(error) => ExportEvent::Failed {
                        message: format!("{error:#}"),
                    },
                };
                // A dropped receiver means the session is gone; nothing to do.
                let _ = events.send(event);
            })
            .context("failed to spawn export worker thread")
    }
}

pub fn artifact_file_name(source_file_name: &str) -> String {
    format!("{ARTIFACT_PREFIX}{source_file_name}")
}

fn run_export(
    request: &ExportRequest,
    cell: &EncoderCell,
    source: &dyn EncoderSource,
) -> Result<(PathBuf, String)> {
    fs::create_dir_all(&request.out_dir).with_context(|| {
        format!(
            "failed to create export directory '{}'",
            request.out_dir.display()
        )
    })?;
    let artifact = request
        .out_dir
        .join(artifact_file_name(&request.source_file_name));

    let rgba = rgba_from_pixmap(&request.frame);
    let width = request.frame.width();
    let height = request.frame.height();

    let bytes = if request.format.is_animated() {
        let encoder_path = cell.acquire(source)?;
        encode_single_frame_gif(&GifEncodeJob {
            encoder_path: &encoder_path,
            width,
            height,
            rgba: &rgba,
            output_path: &artifact,
        })?;
        fs::read(&artifact)
            .with_context(|| format!("failed to read back artifact '{}'", artifact.display()))?
    } else {
        let encoded = encode_still(request.format, &rgba, width, height)?;
        fs::write(&artifact, &encoded)
            .with_context(|| format!("failed to write artifact '{}'", artifact.display()))?;
        encoded
    };

    Ok((artifact, sha256_hex(&bytes)))
}

/// Serializes one frame to the source's own still format.
pub fn encode_still(format: SourceFormat, rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        SourceFormat::Png => PngEncoder::new(&mut buffer)
            .write_image(rgba, width, height, ExtendedColorType::Rgba8)
            .context("failed to encode png artifact")?,
        SourceFormat::Jpeg => {
            // JPEG carries no alpha; the composited frame is opaque anyway.
            let rgb = rgba
                .chunks_exact(4)
                .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
                .collect::<Vec<_>>();
            JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .context("failed to encode jpeg artifact")?
        }
        SourceFormat::WebP => WebPEncoder::new_lossless(&mut buffer)
            .write_image(rgba, width, height, ExtendedColorType::Rgba8)
            .context("failed to encode webp artifact")?,
        SourceFormat::Gif => bail!("gif sources take the animated export path"),
    }
    Ok(buffer)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_prefixes_the_source_name() {
        assert_eq!(artifact_file_name("photo.png"), "watermarked_photo.png");
        assert_eq!(artifact_file_name("anim.gif"), "watermarked_anim.gif");
    }

    #[test]
    fn png_round_trip_preserves_dimensions() {
        let rgba = vec![128_u8; 6 * 4 * 4];
        let encoded = encode_still(SourceFormat::Png, &rgba, 6, 4).expect("png should encode");

        let decoded = image::load_from_memory(&encoded).expect("png should decode");
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn jpeg_encodes_at_fixed_quality() {
        let rgba = vec![200_u8; 8 * 8 * 4];
        let encoded = encode_still(SourceFormat::Jpeg, &rgba, 8, 8).expect("jpeg should encode");
        assert!(!encoded.is_empty());
        assert_eq!(
            image::guess_format(&encoded).expect("format"),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn gif_is_rejected_on_the_still_path() {
        let error = encode_still(SourceFormat::Gif, &[0; 4], 1, 1).unwrap_err();
        assert!(error.to_string().contains("animated"));
    }

    #[test]
    fn digests_are_stable_hex() {
        let digest = sha256_hex(b"sigil");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, sha256_hex(b"sigil"));
    }
}
