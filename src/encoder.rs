use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};

/// Lifecycle of the externally acquired frame encoder. The still-image path
/// never touches this; it exists only for animated exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EncoderState {
    #[default]
    Unloaded,
    Loading,
    Ready(PathBuf),
    Failed(String),
}

/// Where the encoder binary comes from. The seam exists so tests can stand
/// in a source that fails like a dead network would.
pub trait EncoderSource: Send + Sync {
    fn mode_label(&self) -> &'static str;
    fn locate(&self) -> Result<PathBuf>;
}

/// `ffmpeg` already on PATH. Locating verifies the binary actually runs so
/// a missing install surfaces as `Failed` instead of a late spawn error.
pub struct SystemEncoderSource;

impl EncoderSource for SystemEncoderSource {
    fn mode_label(&self) -> &'static str {
        "system"
    }

    fn locate(&self) -> Result<PathBuf> {
        let path = PathBuf::from("ffmpeg");
        let status = Command::new(&path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => Ok(path),
            Ok(status) => bail!("ffmpeg -version exited with {status}"),
            Err(error) if error.kind() == ErrorKind::NotFound => bail!(
                "ffmpeg executable not found on PATH. Install ffmpeg or rebuild with `--features sidecar_ffmpeg`"
            ),
            Err(error) => Err(error).context("failed to probe ffmpeg"),
        }
    }
}

/// Downloaded encoder: fetched from the sidecar release host on first need
/// and cached on disk, so later sessions skip the network entirely.
#[cfg(feature = "sidecar_ffmpeg")]
pub struct SidecarEncoderSource;

#[cfg(feature = "sidecar_ffmpeg")]
impl EncoderSource for SidecarEncoderSource {
    fn mode_label(&self) -> &'static str {
        "sidecar"
    }

    fn locate(&self) -> Result<PathBuf> {
        let path = ffmpeg_sidecar::paths::ffmpeg_path();
        if !path.exists() {
            ffmpeg_sidecar::download::auto_download()
                .context("failed to auto-download ffmpeg sidecar binary")?;
        }
        Ok(path)
    }
}

/// Session-wide encoder handle: `Unloaded -> Loading -> Ready | Failed`.
/// Acquisition is idempotent; once `Ready` the cached path is returned
/// without touching the source again. `Failed` is sticky for the session.
#[derive(Clone, Default)]
pub struct EncoderCell {
    state: Arc<Mutex<EncoderState>>,
}

impl EncoderCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EncoderState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|_| EncoderState::Failed("encoder state lock poisoned".to_owned()))
    }

    pub fn acquire(&self, source: &dyn EncoderSource) -> Result<PathBuf> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("encoder state lock poisoned"))?;
            match &*state {
                EncoderState::Ready(path) => return Ok(path.clone()),
                EncoderState::Failed(message) => {
                    bail!("encoder previously failed to load: {message}")
                }
                EncoderState::Unloaded | EncoderState::Loading => {}
            }
            *state = EncoderState::Loading;
        }

        let located = source
            .locate()
            .with_context(|| format!("failed to acquire {} encoder", source.mode_label()));

        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("encoder state lock poisoned"))?;
        match located {
            Ok(path) => {
                *state = EncoderState::Ready(path.clone());
                Ok(path)
            }
            Err(error) => {
                *state = EncoderState::Failed(format!("{error:#}"));
                Err(error)
            }
        }
    }
}

/// One animated-export job: a single RGBA frame piped to the acquired
/// encoder as rawvideo, written out as a GIF.
pub struct GifEncodeJob<'a> {
    pub encoder_path: &'a Path,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
    pub output_path: &'a Path,
}

pub fn encode_single_frame_gif(job: &GifEncodeJob<'_>) -> Result<()> {
    let path_str = job.output_path.to_string_lossy();
    if path_str.chars().any(|c| c.is_control()) {
        bail!("output path contains invalid control characters");
    }

    let size = format!("{}x{}", job.width, job.height);
    let args = gif_encode_args(&size, job.output_path);
    let mut child = Command::new(job.encoder_path)
        .args(args.iter().map(String::as_str))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "failed to spawn encoder process '{}'",
                job.encoder_path.display()
            )
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("failed to capture encoder stdin"))?;
    let mut stderr_pipe = child.stderr.take();

    stdin
        .write_all(job.rgba)
        .context("failed to write frame to encoder stdin")?;
    stdin.flush().context("failed to flush encoder stdin")?;
    drop(stdin);

    let status = child.wait().context("failed waiting for encoder process")?;
    let stderr_tail = read_stderr_tail(&mut stderr_pipe)?;
    if !status.success() {
        return Err(anyhow!(
            "encoder failed with status {status} (args='{}', stderr_tail='{}')",
            args.join(" "),
            stderr_tail
        ));
    }

    Ok(())
}

fn gif_encode_args(size: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        size.to_owned(),
        "-r".to_owned(),
        "1".to_owned(),
        "-i".to_owned(),
        "-".to_owned(),
        "-frames:v".to_owned(),
        "1".to_owned(),
        "-f".to_owned(),
        "gif".to_owned(),
        output_path.to_string_lossy().into_owned(),
    ]
}

fn read_stderr_tail(stderr: &mut Option<std::process::ChildStderr>) -> Result<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .context("failed reading encoder stderr")?;
    let text = String::from_utf8_lossy(&buf).to_string();
    Ok(last_n_chars(&text, 500))
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let chars = s.chars().collect::<Vec<_>>();
    let start = chars.len().saturating_sub(max_chars);
    chars[start..].iter().collect::<String>().trim().to_owned()
}
