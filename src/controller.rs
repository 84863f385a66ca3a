// SPDX-License-Identifier: GPL-3.0-only

//! Command surface the plugin façade dispatches into
//!
//! The host container serializes commands, so every operation takes
//! `&mut self`; results come back synchronously as command results while
//! frame output and one-shot fulfillments arrive asynchronously on the
//! event channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backends::camera::{
    CameraSession, CaptureLoopController, LoopAction, controls,
};
use crate::config::{CaptureOptions, FocusMode, LensFacing};
use crate::errors::{AppError, AppResult, CameraError, EncodeError};
use crate::events::{EventSender, PluginEvent};
use crate::flash::{self, FlashDevice, FlashMode};
use crate::pipelines::video::{RecordingOrientation, VideoRecorder};
use crate::pipelines::{FramePipeline, PipelineShared};
use crate::render::RenderSurface;
use crate::shaders::FrameConverter;
use crate::storage::{self, OutputKind};

/// How long the delivery loop waits for a frame before re-checking its
/// stop signal
const DELIVERY_POLL: Duration = Duration::from_millis(100);

/// One running capture: session, delivery thread, and shared state
struct ActiveCapture {
    session: CameraSession,
    loop_ctl: CaptureLoopController,
    shared: Arc<PipelineShared>,
    options: CaptureOptions,
    session_suffix: String,
    media_dir: PathBuf,
}

/// The capture core's command surface
pub struct CameraController {
    events: EventSender,
    active: Option<ActiveCapture>,
    flash_devices: Vec<FlashDevice>,
}

impl CameraController {
    /// Create a controller emitting events through `events`
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            active: None,
            flash_devices: FlashDevice::discover(),
        }
    }

    /// Whether a capture session is running
    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a recording is in progress
    pub fn is_recording(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.shared.lock_recorder().is_some())
    }

    /// Start capturing with the given options payload
    ///
    /// A session already running is torn down first; the host treats
    /// start-capture as (re)configure-and-run.
    pub fn start_capture(&mut self, payload: &serde_json::Value) -> AppResult<()> {
        let options = CaptureOptions::from_payload(payload)?;

        if self.active.is_some() {
            debug!("start_capture while active; restarting session");
            self.stop_capture()?;
        }

        let media_dir = storage::media_dir().map_err(|e| AppError::Storage(e.to_string()))?;
        let session_suffix = storage::session_suffix();

        // GPU setup happens here so a missing adapter fails the command
        // instead of silently killing the delivery thread
        let converter = pollster::block_on(FrameConverter::new())?;

        let session = CameraSession::start(&options)?;

        let (canvas_w, canvas_h) = options.canvas_size();
        let shared = PipelineShared::new(RenderSurface::new(canvas_w, canvas_h).into_shared());

        self.apply_start_options(&session, &options);

        let loop_ctl = Self::spawn_delivery(
            &session,
            &options,
            converter,
            Arc::clone(&shared),
            self.events.clone(),
            media_dir.clone(),
            session_suffix.clone(),
        );

        info!(suffix = %session_suffix, "Capture started");
        self.active = Some(ActiveCapture {
            session,
            loop_ctl,
            shared,
            options,
            session_suffix,
            media_dir,
        });
        Ok(())
    }

    /// Stop capturing and release the session
    ///
    /// Safe to call while a draw or encode is in flight: the delivery loop
    /// is joined first, then an active recording is aborted (its partial
    /// file discarded), and only then is the camera released.
    pub fn stop_capture(&mut self) -> AppResult<()> {
        let Some(mut active) = self.active.take() else {
            return Err(CameraError::NotCapturing.into());
        };

        active.loop_ctl.stop();

        if let Some(recorder) = active.shared.lock_recorder().take() {
            warn!("Capture stopped mid-recording; discarding partial output");
            recorder.abort();
        }

        active.shared.requests.clear();
        {
            let mut surface = match active.shared.surface.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            surface.clear();
        }

        active.session.stop();
        flash::apply_mode(&self.flash_devices, FlashMode::Off);
        storage::cleanup_session(&active.media_dir, &active.session_suffix);

        info!(suffix = %active.session_suffix, "Capture stopped");
        Ok(())
    }

    /// Start a video recording tagged with the given orientation
    pub fn start_video_recording(&mut self, orientation_degrees: i32) -> AppResult<()> {
        let active = self.active_mut()?;

        if active.shared.lock_recorder().is_some() {
            return Err(EncodeError::RecordingInProgress.into());
        }

        // Build the recording pipeline before taking the recorder lock so
        // the delivery thread is never blocked on encoder setup
        let orientation = RecordingOrientation::from_degrees(orientation_degrees);
        let path = storage::output_path(
            &active.media_dir,
            OutputKind::Video,
            &active.session_suffix,
        );
        let recorder = VideoRecorder::new(
            active.session.width(),
            active.session.height(),
            active.session.framerate(),
            orientation,
            path,
            crate::constants::BitratePreset::default(),
        )?;
        recorder.start()?;

        let mut recorder_slot = active.shared.lock_recorder();
        if recorder_slot.is_some() {
            // Lost a race with another start command; keep the first
            recorder.abort();
            return Err(EncodeError::RecordingInProgress.into());
        }
        *recorder_slot = Some(recorder);

        Ok(())
    }

    /// Stop the recording and report the finalized file
    pub fn stop_video_recording(&mut self) -> AppResult<PathBuf> {
        let active = self.active_mut()?;

        let recorder = active
            .shared
            .lock_recorder()
            .take()
            .ok_or(EncodeError::NoRecordingInProgress)?;

        let path = recorder.stop()?;
        let _ = self.events.send(PluginEvent::RecordingComplete {
            file: path.to_string_lossy().into_owned(),
        });
        Ok(path)
    }

    /// Register a one-shot fullsize request
    ///
    /// Served from the next converted frame; duplicates coalesce. Fails
    /// fast when fullsize output is disabled, without ever invoking the
    /// encoder.
    pub fn request_single_fullsize(&mut self) -> AppResult<()> {
        let active = self.active_ref()?;
        if active.options.disable_fullsize {
            return Err(EncodeError::FeatureDisabled.into());
        }
        if !active.shared.requests.request_fullsize() {
            debug!("Fullsize request coalesced with pending request");
        }
        Ok(())
    }

    /// Register a one-shot thumbnail request
    pub fn request_single_thumbnail(&mut self) -> AppResult<()> {
        let active = self.active_ref()?;
        if !active.shared.requests.request_thumbnail() {
            debug!("Thumbnail request coalesced with pending request");
        }
        Ok(())
    }

    /// Turn the torch on or off
    pub fn flash_mode(&mut self, enabled: bool) -> AppResult<()> {
        self.active_ref()?;
        flash::apply_mode(&self.flash_devices, FlashMode::from(enabled));
        Ok(())
    }

    /// Switch between front and back cameras
    ///
    /// Restarts the session on the new device; frames in flight from the
    /// old device are invalidated.
    pub fn camera_position(&mut self, facing: LensFacing) -> AppResult<()> {
        let Some(active) = self.active.as_ref() else {
            return Err(CameraError::NotCapturing.into());
        };
        if active.session.facing() == facing {
            return Ok(());
        }

        let mut options = active.options.clone();
        options.camera_facing = facing;
        let payload =
            serde_json::to_value(&options).map_err(|e| AppError::Other(e.to_string()))?;
        self.start_capture(&payload)
    }

    /// Set the zoom factor (1.0 = widest)
    pub fn set_zoom(&mut self, factor: f64) -> AppResult<()> {
        let active = self.active_ref()?;
        controls::apply_zoom(active.session.device_path(), factor)?;
        Ok(())
    }

    /// Set the focus mode, with an optional normalized distance for fixed
    /// focus
    pub fn set_focus(&mut self, mode: FocusMode, distance: Option<f64>) -> AppResult<()> {
        let active = self.active_ref()?;
        controls::apply_focus(active.session.device_path(), mode, distance)?;
        Ok(())
    }

    /// Set exposure compensation in EV
    pub fn set_exposure_compensation(&mut self, ev: f64) -> AppResult<()> {
        let active = self.active_ref()?;
        controls::apply_exposure_bias(active.session.device_path(), ev)?;
        Ok(())
    }

    /// Set the metering point of interest (normalized coordinates)
    pub fn set_point_of_interest(&mut self, x: f64, y: f64) -> AppResult<()> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "point of interest ({}, {}) outside unit square",
                x, y
            ))
            .into());
        }
        let active = self.active_ref()?;
        controls::apply_point_of_interest(active.session.device_path(), x, y)?;
        Ok(())
    }

    /// Resize the preview viewport
    ///
    /// Recomputes the crop rectangle from the latest frame and repaints;
    /// an in-flight draw on the delivery thread is not blocked beyond the
    /// render lock itself.
    pub fn set_preview_frame(&mut self, width: u32, height: u32) -> AppResult<()> {
        if width == 0 || height == 0 {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "preview size {}x{} has a zero dimension",
                width, height
            ))
            .into());
        }
        let active = self.active_ref()?;
        let mut surface = match active.shared.surface.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        surface.resize(width, height);
        Ok(())
    }

    fn active_ref(&self) -> Result<&ActiveCapture, CameraError> {
        self.active.as_ref().ok_or(CameraError::NotCapturing)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveCapture, CameraError> {
        self.active.as_mut().ok_or(CameraError::NotCapturing)
    }

    /// Apply the control-plane options carried in the start payload
    ///
    /// These are best-effort: a webcam without a given control still
    /// previews, and explicit control commands remain available for the
    /// host to get a hard error.
    fn apply_start_options(&self, session: &CameraSession, options: &CaptureOptions) {
        flash::apply_mode(&self.flash_devices, FlashMode::from(options.flash_mode));

        if let Some(mode) = options.focus_mode
            && let Err(e) = controls::apply_focus(session.device_path(), mode, options.focus_distance)
        {
            warn!(error = %e, "Initial focus mode not applied");
        }
        if let Some(ev) = options.exposure_compensation
            && let Err(e) = controls::apply_exposure_bias(session.device_path(), ev)
        {
            warn!(error = %e, "Initial exposure bias not applied");
        }
        if let Some(poi) = options.point_of_interest
            && let Err(e) = controls::apply_point_of_interest(session.device_path(), poi.x, poi.y)
        {
            warn!(error = %e, "Initial point of interest not applied");
        }
    }

    /// Spawn the delivery thread draining the session's frame slot
    fn spawn_delivery(
        session: &CameraSession,
        options: &CaptureOptions,
        converter: FrameConverter,
        shared: Arc<PipelineShared>,
        events: EventSender,
        media_dir: PathBuf,
        session_suffix: String,
    ) -> CaptureLoopController {
        let slot = session.slot();
        let options = options.clone();

        CaptureLoopController::start_with_init(
            "frame-delivery",
            move || {
                Ok(FramePipeline::new(
                    options,
                    converter,
                    shared,
                    events,
                    media_dir,
                    session_suffix,
                ))
            },
            move |pipeline: &mut FramePipeline| {
                if let Some(frame) = slot.take(DELIVERY_POLL) {
                    pipeline.process_frame(frame);
                }
                LoopAction::Continue
            },
        )
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if self.active.is_some() {
            let _ = self.stop_capture();
        }
    }
}
