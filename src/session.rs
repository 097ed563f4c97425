use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use fontdue::Font;
use tiny_skia::Pixmap;

use crate::compositor::composite;
use crate::encoder::{EncoderSource, EncoderState, SystemEncoderSource};
use crate::export::{ExportEvent, ExportPipeline, ExportRequest};
use crate::font_assets::load_outline_font;
use crate::mark::render_mark;
use crate::media::{load_image_pixmap, SourceMedia};
use crate::schema::{MarkKind, WatermarkConfig};

/// Rapid config edits within this window collapse into one recomposition.
pub const REDRAW_DEBOUNCE: Duration = Duration::from_millis(50);

/// Result of an export request. `Busy` and `NoSource` are quiet no-ops, not
/// errors: a pending export and a missing source both mean "nothing to do".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStart {
    Started,
    Busy,
    NoSource,
}

/// Explicit pending-redraw token. Scheduling replaces any pending entry, so
/// only the newest request's redraw ever runs; there is no timer to cancel.
struct RedrawScheduler {
    interval: Duration,
    token: u64,
    pending: Option<(u64, Instant)>,
}

impl RedrawScheduler {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            token: 0,
            pending: None,
        }
    }

    fn schedule(&mut self, now: Instant) -> u64 {
        self.token += 1;
        self.pending = Some((self.token, now + self.interval));
        self.token
    }

    fn take_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some((token, due)) if now >= due && token == self.token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn clear(&mut self) {
        self.pending = None;
    }
}

/// The interactive controller. Owns the config, the current source, the
/// decoded mark image and the export-in-flight flag; everything else gets
/// read-only snapshots for the duration of one redraw or export.
pub struct Session {
    config: WatermarkConfig,
    source: Option<SourceMedia>,
    mark_image: Option<Pixmap>,
    outline_font: Option<(PathBuf, Font)>,
    output: Option<Pixmap>,
    pipeline: ExportPipeline,
    export_in_flight: bool,
    export_sender: mpsc::Sender<ExportEvent>,
    export_events: mpsc::Receiver<ExportEvent>,
    export_worker: Option<JoinHandle<()>>,
    redraw: RedrawScheduler,
    recompose_count: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::with_encoder_source(Arc::new(SystemEncoderSource))
    }

    pub fn with_encoder_source(encoder_source: Arc<dyn EncoderSource>) -> Self {
        let (export_sender, export_events) = mpsc::channel();
        Self {
            config: WatermarkConfig::default(),
            source: None,
            mark_image: None,
            outline_font: None,
            output: None,
            pipeline: ExportPipeline::new(encoder_source),
            export_in_flight: false,
            export_sender,
            export_events,
            export_worker: None,
            redraw: RedrawScheduler::new(REDRAW_DEBOUNCE),
            recompose_count: 0,
        }
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    pub fn output(&self) -> Option<&Pixmap> {
        self.output.as_ref()
    }

    pub fn recompose_count(&self) -> u64 {
        self.recompose_count
    }

    pub fn export_in_flight(&self) -> bool {
        self.export_in_flight
    }

    pub fn encoder_state(&self) -> EncoderState {
        self.pipeline.encoder_state()
    }

    /// Replaces the whole config (validated) and schedules a redraw.
    pub fn replace_config(&mut self, config: WatermarkConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.schedule_redraw();
        Ok(())
    }

    /// Merges a partial edit. The mutation runs on a copy and is committed
    /// only if the result validates, so a bad edit cannot wedge the session.
    pub fn update_config(&mut self, edit: impl FnOnce(&mut WatermarkConfig)) -> Result<()> {
        let mut draft = self.config.clone();
        edit(&mut draft);
        draft.validate()?;
        self.config = draft;
        self.schedule_redraw();
        Ok(())
    }

    /// Replaces the source wholesale and resets the export flag.
    pub fn set_source(&mut self, path: &Path) -> Result<()> {
        let media = SourceMedia::load(path)?;
        self.source = Some(media);
        self.output = None;
        self.export_in_flight = false;
        self.schedule_redraw();
        Ok(())
    }

    pub fn source(&self) -> Option<&SourceMedia> {
        self.source.as_ref()
    }

    /// Decodes a mark asset, switches the config to image kind and schedules
    /// a redraw, mirroring the upload flow of the original tool.
    pub fn set_mark_image(&mut self, path: &Path) -> Result<()> {
        let pixmap = load_image_pixmap(path)?;
        self.mark_image = Some(pixmap);
        self.config.kind = MarkKind::Image;
        self.config.image_path = Some(path.to_path_buf());
        self.schedule_redraw();
        Ok(())
    }

    pub fn schedule_redraw(&mut self) {
        self.redraw.schedule(Instant::now());
    }

    /// Advances the debounce clock and drains export completions. All state
    /// mutation stays on the caller's thread; workers only send events.
    pub fn poll(&mut self) -> Result<Vec<ExportEvent>> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Result<Vec<ExportEvent>> {
        if self.redraw.take_due(now) {
            self.recompose()?;
        }

        let mut events = Vec::new();
        while let Ok(event) = self.export_events.try_recv() {
            events.push(event);
        }

        if !events.is_empty() {
            self.export_in_flight = false;
            if let Some(worker) = self.export_worker.take() {
                let _ = worker.join();
            }
        } else if self.export_in_flight
            && self
                .export_worker
                .as_ref()
                .is_some_and(JoinHandle::is_finished)
        {
            if let Some(worker) = self.export_worker.take() {
                let _ = worker.join();
            }
            // The join fences the channel: any completion sent before the
            // worker exited is visible now. An empty drain means a panic.
            while let Ok(event) = self.export_events.try_recv() {
                events.push(event);
            }
            self.export_in_flight = false;
            if events.is_empty() {
                events.push(ExportEvent::Failed {
                    message: "export worker terminated unexpectedly".to_owned(),
                });
            }
        }

        Ok(events)
    }

    /// Runs any pending redraw immediately.
    pub fn flush_redraw(&mut self) -> Result<()> {
        self.redraw.clear();
        self.recompose()
    }

    fn recompose(&mut self) -> Result<()> {
        if self.source.is_none() {
            // Source not decoded yet; the redraw re-runs after it lands.
            return Ok(());
        }
        self.ensure_outline_font()?;

        let outline = self.outline_font.as_ref().map(|(_, font)| font);
        let source = match self.source.as_ref() {
            Some(source) => source,
            None => return Ok(()),
        };
        let mark = render_mark(&self.config, self.mark_image.as_ref(), outline)?;
        let output = composite(&source.frame, &self.config, mark.as_ref())?;
        self.output = Some(output);
        self.recompose_count += 1;
        Ok(())
    }

    fn ensure_outline_font(&mut self) -> Result<()> {
        match self.config.font_path.clone() {
            Some(path) => {
                let stale = self
                    .outline_font
                    .as_ref()
                    .map(|(cached, _)| cached != &path)
                    .unwrap_or(true);
                if stale {
                    let font = load_outline_font(&path)?;
                    self.outline_font = Some((path, font));
                }
            }
            None => self.outline_font = None,
        }
        Ok(())
    }

    /// Starts an export of the current output buffer. One export may be in
    /// flight at a time; the flag clears when `poll` drains the completion.
    pub fn request_export(&mut self, out_dir: &Path) -> Result<ExportStart> {
        if self.export_in_flight {
            return Ok(ExportStart::Busy);
        }
        if self.source.is_none() {
            return Ok(ExportStart::NoSource);
        }

        if self.redraw.is_pending() || self.output.is_none() {
            self.flush_redraw()?;
        }

        let source = match self.source.as_ref() {
            Some(source) => source,
            None => return Ok(ExportStart::NoSource),
        };
        let frame = match self.output.clone() {
            Some(frame) => frame,
            None => return Ok(ExportStart::NoSource),
        };

        let request = ExportRequest {
            frame,
            format: source.format,
            source_file_name: source.file_name.clone(),
            out_dir: out_dir.to_path_buf(),
        };
        let worker = self.pipeline.spawn(request, self.export_sender.clone())?;
        self.export_worker = Some(worker);
        self.export_in_flight = true;
        Ok(ExportStart::Started)
    }

    /// Polls until the in-flight export reports, or the timeout lapses.
    pub fn wait_for_export(&mut self, timeout: Duration) -> Result<Option<ExportEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.poll()?;
            if let Some(event) = events.into_iter().next() {
                return Ok(Some(event));
            }
            if !self.export_in_flight || Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
