use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

use sigil::auth::AuthGateway;
use sigil::catalog::CatalogGateway;
use sigil::chat::ChatClient;
use sigil::config::{apply_overrides, load_and_validate_config, ConfigOverride};
use sigil::encoder::{EncoderSource, SystemEncoderSource};
use sigil::export::ExportEvent;
use sigil::schema::{MarkKind, MarkMode, WatermarkConfig};
use sigil::session::{ExportStart, Session};

const EXPORT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Parser)]
#[command(name = "sigil")]
#[command(about = "Sigil: local-first watermark compositor and exporter")]
#[command(version = long_version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Composite the configured mark onto a source image and export it.
    Apply {
        source: PathBuf,
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Config override, e.g. --set opacity=0.3 (repeatable).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<ConfigOverride>,
        #[arg(short = 'o', long = "out-dir")]
        out_dir: Option<PathBuf>,
        #[arg(long = "encoder", default_value = "auto")]
        encoder: EncoderMode,
    },
    /// Validate a watermark config document.
    Check { config: PathBuf },
    /// List the project catalog.
    Projects {
        #[arg(long)]
        json: bool,
    },
    /// Check the fixed admin credentials.
    Login { username: String, password: String },
    /// One chat round trip (offline fallback without an API key).
    Chat { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncoderMode {
    Auto,
    System,
    Sidecar,
}

fn long_version() -> &'static str {
    let version = match option_env!("SIGIL_GIT_HASH") {
        Some(hash) => format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_owned(),
    };
    Box::leak(version.into_boxed_str())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            source,
            config,
            set,
            out_dir,
            encoder,
        } => run_apply(&source, config.as_deref(), &set, out_dir, encoder),
        Commands::Check { config } => run_check(&config),
        Commands::Projects { json } => run_projects(json),
        Commands::Login { username, password } => run_login(&username, &password),
        Commands::Chat { message } => run_chat(&message),
    }
}

fn select_encoder_source(mode: EncoderMode) -> Result<Arc<dyn EncoderSource>> {
    match mode {
        EncoderMode::Auto | EncoderMode::System => Ok(Arc::new(SystemEncoderSource)),
        EncoderMode::Sidecar => {
            #[cfg(feature = "sidecar_ffmpeg")]
            {
                Ok(Arc::new(sigil::encoder::SidecarEncoderSource))
            }
            #[cfg(not(feature = "sidecar_ffmpeg"))]
            {
                bail!(
                    "sidecar encoder requested but sigil was built without `sidecar_ffmpeg`. Rebuild with `--features sidecar_ffmpeg`."
                )
            }
        }
    }
}

fn run_apply(
    source_path: &Path,
    config_path: Option<&Path>,
    overrides: &[ConfigOverride],
    out_dir: Option<PathBuf>,
    encoder: EncoderMode,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => load_and_validate_config(path)?,
        None => WatermarkConfig::default(),
    };
    apply_overrides(&mut config, overrides)?;

    let mut session = Session::with_encoder_source(select_encoder_source(encoder)?);
    session.replace_config(config)?;

    if session.config().kind == MarkKind::Image {
        if let Some(image_path) = session.config().image_path.clone() {
            session.set_mark_image(&image_path)?;
        }
    }

    session.set_source(source_path)?;
    if let Some(source) = session.source() {
        eprintln!(
            "[sigil] source {}x{} ({}, {} frame(s))",
            source.width(),
            source.height(),
            source.format.mime(),
            source.frame_count()?
        );
    }

    session.flush_redraw()?;
    if let Some(output) = session.output() {
        eprintln!("[sigil] composited output {}x{}", output.width(), output.height());
    }

    let out_dir = out_dir.unwrap_or_else(|| {
        source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    match session.request_export(&out_dir)? {
        ExportStart::Started => {}
        ExportStart::Busy => bail!("another export is already in flight"),
        ExportStart::NoSource => bail!("nothing to export"),
    }

    match session.wait_for_export(EXPORT_TIMEOUT)? {
        Some(ExportEvent::Finished { path, sha256 }) => {
            println!("Wrote {} (sha256={sha256})", path.display());
            Ok(())
        }
        Some(ExportEvent::Failed { message }) => bail!("export failed: {message}"),
        None => bail!("export timed out after {}s", EXPORT_TIMEOUT.as_secs()),
    }
}

fn run_check(config_path: &Path) -> Result<()> {
    let config = load_and_validate_config(config_path)?;

    let mode = match config.mode {
        MarkMode::Tiled => "tiled",
        MarkMode::Single => "single",
    };
    println!(
        "OK: {} (mode={mode}, opacity={}, rotation={}°, gap={})",
        config_path.display(),
        config.opacity,
        config.rotation_degrees,
        config.gap
    );
    match config.kind {
        MarkKind::Text => println!(
            "Mark: text {:?} size={} color={}",
            config.text, config.text_size, config.text_color
        ),
        MarkKind::Image => match &config.image_path {
            Some(path) => println!(
                "Mark: image {} scale={}",
                path.display(),
                config.image_scale
            ),
            None => println!("Mark: image (asset pending upload)"),
        },
    }
    Ok(())
}

fn run_projects(json: bool) -> Result<()> {
    let response = CatalogGateway::new().projects();
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    for project in &response.data {
        println!("{:<18} {} - {}", project.id, project.title, project.subtitle);
    }
    Ok(())
}

fn run_login(username: &str, password: &str) -> Result<()> {
    let outcome = AuthGateway::new().login(username, password);
    if !outcome.success {
        bail!("{}", outcome.message);
    }
    println!("{}", outcome.message);
    if let Some(token) = outcome.token {
        println!("token: {token}");
    }
    Ok(())
}

fn run_chat(message: &str) -> Result<()> {
    let client = ChatClient::from_env()?;
    if client.is_offline() {
        eprintln!("[sigil] no {} set; answering offline", sigil::chat::CHAT_API_KEY_ENV);
    }
    println!("{}", client.send_message(message));
    Ok(())
}
