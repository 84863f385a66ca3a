// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame processing pipeline
//!
//! Runs on the delivery thread. Each raw frame is converted on the GPU,
//! drawn into the render surface under the render lock, used to service any
//! pending one-shot requests, pushed into an active recording, and emitted
//! as a preview payload. The texture cache is flushed at the end of every
//! cycle.
//!
//! Per-frame failures are swallowed at the frame level; a single error
//! event is escalated only after enough consecutive failures to indicate a
//! systemic problem, and the counter resets on the next good frame.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::photo::{EncodedImage, OutputRequests, PhotoEncoder};
use super::video::VideoRecorder;
use crate::backends::camera::RawFrame;
use crate::config::{CaptureOptions, UseMode};
use crate::constants::MAX_CONSECUTIVE_FRAME_FAILURES;
use crate::errors::{EncodeError, ErrorKind};
use crate::events::{DrawCoordinates, EventSender, ImagePayload, PluginEvent};
use crate::render::{SharedSurface, Size, ViewportRect, fit_frame};
use crate::shaders::{ConvertedImage, FrameConverter, TextureCache};
use crate::storage::{self, OutputKind};

/// State shared between the delivery thread and the command context
pub struct PipelineShared {
    /// The render lock guarding the latest frame and all drawing
    pub surface: SharedSurface,
    /// Pending one-shot output requests
    pub requests: OutputRequests,
    /// Active video recording, if any
    pub recorder: Mutex<Option<VideoRecorder>>,
}

impl PipelineShared {
    pub fn new(surface: SharedSurface) -> Arc<Self> {
        Arc::new(Self {
            surface,
            requests: OutputRequests::new(),
            recorder: Mutex::new(None),
        })
    }

    /// Lock the recorder slot, recovering from a poisoned lock
    pub fn lock_recorder(&self) -> MutexGuard<'_, Option<VideoRecorder>> {
        match self.recorder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The delivery-context frame processor
pub struct FramePipeline {
    options: CaptureOptions,
    converter: FrameConverter,
    cache: TextureCache,
    shared: Arc<PipelineShared>,
    events: EventSender,
    encoder: PhotoEncoder,
    thumbnail_encoder: PhotoEncoder,
    media_dir: PathBuf,
    session_suffix: String,
    frame_index: u64,
    consecutive_failures: u32,
    escalated: bool,
}

impl FramePipeline {
    pub fn new(
        options: CaptureOptions,
        converter: FrameConverter,
        shared: Arc<PipelineShared>,
        events: EventSender,
        media_dir: PathBuf,
        session_suffix: String,
    ) -> Self {
        let cache = converter.create_texture_cache();
        Self {
            options,
            converter,
            cache,
            shared,
            events,
            encoder: PhotoEncoder::new(),
            thumbnail_encoder: PhotoEncoder::thumbnail(),
            media_dir,
            session_suffix,
            frame_index: 0,
            consecutive_failures: 0,
            escalated: false,
        }
    }

    /// Process one delivered frame end to end
    pub fn process_frame(&mut self, frame: RawFrame) {
        self.cache.begin_cycle();

        // Preview payloads, one-shot stills and recording all consume CPU
        // pixels, so every frame converts with readback
        let image = match pollster::block_on(self.converter.convert(&frame, &mut self.cache, true))
        {
            Ok(image) => Arc::new(image),
            Err(e) => {
                // A full cache means stale bindings piled up faster than
                // flush() ages them out; dropping everything lets the next
                // frame rebind from scratch
                if matches!(e, crate::errors::ConvertError::ResourceExhausted(_)) {
                    self.cache.invalidate();
                }
                self.note_frame_failure(e.kind(), e.to_string());
                self.cache.flush();
                return;
            }
        };

        // Update the latest frame and draw, holding the render lock only
        // for the update itself
        let rect = {
            let mut surface = match self.shared.surface.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let (vw, vh) = surface.viewport();
            match fit_frame(Size::from((image.width, image.height)), Size::from((vw, vh))) {
                Ok(rect) => {
                    surface.draw(Arc::clone(&image), rect);
                    rect
                }
                Err(e) => {
                    drop(surface);
                    self.note_frame_failure(ErrorKind::UnsupportedConfiguration, e.to_string());
                    self.cache.flush();
                    return;
                }
            }
        };

        let failures_entering_cycle = self.consecutive_failures;

        self.service_requests(&image, rect);
        self.feed_recorder(&image);

        if !self.options.generate_output_only_on_request {
            self.emit_preview(&image, rect);
        }

        // A clean cycle resets the failure streak; a preview-encode failure
        // inside this cycle keeps counting toward escalation
        if self.consecutive_failures == failures_entering_cycle {
            self.consecutive_failures = 0;
            self.escalated = false;
        }

        self.frame_index += 1;
        self.cache.flush();
    }

    /// Serve pending one-shot requests from this frame
    ///
    /// Requests registered after this frame was delivered wait for the next
    /// one; each token is consumed exactly once.
    fn service_requests(&mut self, image: &ConvertedImage, rect: ViewportRect) {
        if self.shared.requests.take_fullsize() {
            // Honor a requested capture size smaller than the sensor frame
            let (capture_w, _) = self.options.capture_size();
            let scale = if capture_w < image.width {
                Some(capture_w as f64 / image.width as f64)
            } else {
                None
            };
            match self.produce_output(image, rect, OutputKind::Fullsize, scale) {
                Ok(payload) => self.emit(PluginEvent::Fullsize { image: payload }),
                Err(e) => self.emit(PluginEvent::error(e.kind(), e.to_string())),
            }
        }

        if self.shared.requests.take_thumbnail() {
            let ratio = self.options.thumbnail_ratio;
            match self.produce_output(image, rect, OutputKind::Thumbnail, Some(ratio)) {
                Ok(payload) => self.emit(PluginEvent::Thumbnail { image: payload }),
                Err(e) => self.emit(PluginEvent::error(e.kind(), e.to_string())),
            }
        }
    }

    /// Push the frame into an active recording
    fn feed_recorder(&mut self, image: &ConvertedImage) {
        let mut recorder = self.shared.lock_recorder();
        if let Some(recorder) = recorder.as_mut()
            && let Err(e) = recorder.push_frame(image)
        {
            warn!(error = %e, "Dropping frame from recording");
        }
    }

    /// Encode and emit the per-frame preview payload
    fn emit_preview(&mut self, image: &ConvertedImage, rect: ViewportRect) {
        let fullsize = if self.options.disable_fullsize {
            None
        } else {
            match self.preview_output(image, rect, OutputKind::Fullsize, None) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    self.note_frame_failure(e.kind(), e.to_string());
                    return;
                }
            }
        };

        let thumbnail = if self.options.has_thumbnail {
            let ratio = self.options.thumbnail_ratio;
            match self.preview_output(image, rect, OutputKind::Thumbnail, Some(ratio)) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    self.note_frame_failure(e.kind(), e.to_string());
                    return;
                }
            }
        } else {
            None
        };

        if fullsize.is_some() || thumbnail.is_some() {
            self.emit(PluginEvent::Preview {
                fullsize,
                thumbnail,
            });
        }
    }

    /// Encode one output image for a one-shot request
    fn produce_output(
        &self,
        image: &ConvertedImage,
        rect: ViewportRect,
        kind: OutputKind,
        scale_ratio: Option<f64>,
    ) -> Result<ImagePayload, EncodeError> {
        let encoded = self.encode_for(image, kind, scale_ratio)?;
        let file = match self.options.use_mode {
            UseMode::File => {
                // The frame index keeps successive one-shot captures within
                // the same session from overwriting each other
                let suffix = format!("{}_f{}", self.session_suffix, self.frame_index);
                let path = storage::output_path(&self.media_dir, kind, &suffix);
                Some(
                    encoded
                        .save_to(&path)?
                        .to_string_lossy()
                        .into_owned(),
                )
            }
            UseMode::Data => None,
        };
        Ok(ImagePayload::new(
            &encoded,
            self.options.use_mode,
            file,
            self.payload_coordinates(rect, kind),
        ))
    }

    /// Encode one per-frame preview image, cycling the file ring
    fn preview_output(
        &self,
        image: &ConvertedImage,
        rect: ViewportRect,
        kind: OutputKind,
        scale_ratio: Option<f64>,
    ) -> Result<ImagePayload, EncodeError> {
        let encoded = self.encode_for(image, kind, scale_ratio)?;
        let file = match self.options.use_mode {
            UseMode::File => {
                let path = storage::preview_path(
                    &self.media_dir,
                    kind,
                    &self.session_suffix,
                    self.frame_index,
                );
                Some(
                    encoded
                        .save_to(&path)?
                        .to_string_lossy()
                        .into_owned(),
                )
            }
            UseMode::Data => None,
        };
        Ok(ImagePayload::new(
            &encoded,
            self.options.use_mode,
            file,
            self.payload_coordinates(rect, kind),
        ))
    }

    fn encode_for(
        &self,
        image: &ConvertedImage,
        kind: OutputKind,
        scale_ratio: Option<f64>,
    ) -> Result<EncodedImage, EncodeError> {
        match (kind, scale_ratio) {
            (OutputKind::Thumbnail, Some(ratio)) => {
                self.thumbnail_encoder.encode_scaled(image, ratio)
            }
            (_, Some(ratio)) => self.encoder.encode_scaled(image, ratio),
            _ => self.encoder.encode(image),
        }
    }

    /// Thumbnail payloads scale the draw coordinates by the same ratio as
    /// the image so the canvas side draws both without recomputing. The
    /// session's crop offset shifts everything within the canvas.
    fn payload_coordinates(&self, rect: ViewportRect, kind: OutputKind) -> DrawCoordinates {
        let offset_x = self.options.x as f32;
        let offset_y = self.options.y as f32;
        match kind {
            OutputKind::Thumbnail => {
                let r = self.options.thumbnail_ratio as f32;
                DrawCoordinates {
                    x: (rect.x + offset_x) * r,
                    y: (rect.y + offset_y) * r,
                    width: rect.width * r,
                    height: rect.height * r,
                }
            }
            _ => DrawCoordinates {
                x: rect.x + offset_x,
                y: rect.y + offset_y,
                width: rect.width,
                height: rect.height,
            },
        }
    }

    fn note_frame_failure(&mut self, kind: ErrorKind, message: String) {
        self.consecutive_failures += 1;
        debug!(
            failures = self.consecutive_failures,
            %message,
            "Frame skipped"
        );

        if self.consecutive_failures >= MAX_CONSECUTIVE_FRAME_FAILURES && !self.escalated {
            warn!(
                failures = self.consecutive_failures,
                %message,
                "Persistent frame failures; escalating"
            );
            self.emit(PluginEvent::error(
                kind,
                format!(
                    "{} consecutive frames failed: {}",
                    self.consecutive_failures, message
                ),
            ));
            self.escalated = true;
        }
    }

    fn emit(&self, event: PluginEvent) {
        // A closed receiver means the façade is gone; nothing to do
        let _ = self.events.send(event);
    }
}
