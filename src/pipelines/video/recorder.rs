// SPDX-License-Identifier: GPL-3.0-only

//! Video recording pipeline
//!
//! Multiplexes the stream of converted frames into a container file. The
//! delivery thread pushes RGBA frames through an appsrc; encoder selection
//! prefers H.264 into MP4 and falls back to VP8/WebM when no H.264 encoder
//! is present. Stopping either finalizes a complete file or discards the
//! partial output; a truncated container is never left behind.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::muxer::{MuxerConfig, RecordingOrientation, create_muxer, link_muxer_to_sink, link_video_to_muxer};
use crate::backends::camera::Framerate;
use crate::constants::BitratePreset;
use crate::errors::EncodeError;
use crate::shaders::ConvertedImage;

/// A selected encoder chain
struct SelectedEncoder {
    encoder: gst::Element,
    parser: Option<gst::Element>,
    muxer: gst::Element,
    extension: &'static str,
}

/// Pick the best available encoder chain for this system
///
/// Preference order mirrors availability on typical installs: x264,
/// OpenH264, then VP8 as the safety net shipped with base GStreamer.
fn select_encoder(width: u32, height: u32, preset: BitratePreset) -> Result<SelectedEncoder, EncodeError> {
    let kbps = preset.kbps(width, height);

    if let Ok(encoder) = gst::ElementFactory::make("x264enc")
        .property("bitrate", kbps)
        .build()
    {
        let parser = gst::ElementFactory::make("h264parse")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create h264parse: {}", e)))?;
        let muxer = gst::ElementFactory::make("mp4mux")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create mp4mux: {}", e)))?;
        info!(kbps, "Selected x264 encoder");
        return Ok(SelectedEncoder {
            encoder,
            parser: Some(parser),
            muxer,
            extension: "mp4",
        });
    }

    if let Ok(encoder) = gst::ElementFactory::make("openh264enc")
        .property("bitrate", kbps * 1000)
        .build()
    {
        let parser = gst::ElementFactory::make("h264parse")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create h264parse: {}", e)))?;
        let muxer = gst::ElementFactory::make("mp4mux")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create mp4mux: {}", e)))?;
        info!(kbps, "Selected OpenH264 encoder");
        return Ok(SelectedEncoder {
            encoder,
            parser: Some(parser),
            muxer,
            extension: "mp4",
        });
    }

    let encoder = gst::ElementFactory::make("vp8enc")
        .property("target-bitrate", (kbps * 1000) as i32)
        .build()
        .map_err(|e| EncodeError::Failure(format!("no usable video encoder: {}", e)))?;
    let muxer = gst::ElementFactory::make("webmmux")
        .build()
        .map_err(|e| EncodeError::Failure(format!("create webmmux: {}", e)))?;
    info!(kbps, "Selected VP8 encoder");
    Ok(SelectedEncoder {
        encoder,
        parser: None,
        muxer,
        extension: "webm",
    })
}

/// Active video recording fed by the delivery thread
pub struct VideoRecorder {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    file_path: PathBuf,
    orientation: RecordingOrientation,
    width: u32,
    height: u32,
    frame_duration_ns: u64,
    frames_pushed: u64,
}

impl VideoRecorder {
    /// Build the recording pipeline
    ///
    /// The output path's extension is replaced to match the selected
    /// container. Orientation is fixed here, at record start.
    pub fn new(
        width: u32,
        height: u32,
        framerate: Framerate,
        orientation: RecordingOrientation,
        output_path: PathBuf,
        preset: BitratePreset,
    ) -> Result<Self, EncodeError> {
        gst::init().map_err(|e| EncodeError::Failure(format!("gstreamer init: {}", e)))?;

        let selected = select_encoder(width, height, preset)?;
        let output_path = output_path.with_extension(selected.extension);

        info!(
            width,
            height,
            fps = %framerate,
            ?orientation,
            output = %output_path.display(),
            "Creating video recorder"
        );

        let pipeline = gst::Pipeline::new();

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGBA")
            .field("width", width as i32)
            .field("height", height as i32)
            .field(
                "framerate",
                gst::Fraction::new(framerate.num as i32, framerate.denom as i32),
            )
            .build();

        let appsrc = gst::ElementFactory::make("appsrc")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create appsrc: {}", e)))?
            .dynamic_cast::<gst_app::AppSrc>()
            .map_err(|_| EncodeError::Failure("appsrc cast failed".into()))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_property("is-live", true);
        appsrc.set_property("block", false);

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| EncodeError::Failure(format!("create videoconvert: {}", e)))?;

        let MuxerConfig {
            muxer,
            filesink,
            output_path,
        } = create_muxer(selected.muxer, output_path, orientation)?;

        let mut elements: Vec<&gst::Element> = vec![
            appsrc.upcast_ref::<gst::Element>(),
            &videoconvert,
            &selected.encoder,
        ];
        if let Some(ref parser) = selected.parser {
            elements.push(parser);
        }
        elements.push(&muxer);
        elements.push(&filesink);

        pipeline
            .add_many(&elements)
            .map_err(|e| EncodeError::Failure(format!("add elements: {}", e)))?;

        appsrc
            .link(&videoconvert)
            .map_err(|_| EncodeError::Failure("link appsrc to videoconvert".into()))?;
        videoconvert
            .link(&selected.encoder)
            .map_err(|_| EncodeError::Failure("link videoconvert to encoder".into()))?;

        if let Some(ref parser) = selected.parser {
            selected
                .encoder
                .link(parser)
                .map_err(|_| EncodeError::Failure("link encoder to parser".into()))?;
            link_video_to_muxer(parser, &muxer)?;
        } else {
            link_video_to_muxer(&selected.encoder, &muxer)?;
        }
        link_muxer_to_sink(&muxer, &filesink)?;

        Ok(Self {
            pipeline,
            appsrc,
            file_path: output_path,
            orientation,
            width,
            height,
            frame_duration_ns: framerate.frame_duration_ns(),
            frames_pushed: 0,
        })
    }

    /// Start recording
    pub fn start(&self) -> Result<(), EncodeError> {
        info!("Starting video recording");
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| EncodeError::Failure(format!("start recording: {}", e)))?;

        // Surface immediate pipeline errors as a failed start
        if let Some(bus) = self.pipeline.bus()
            && let Some(msg) = bus.timed_pop_filtered(
                gst::ClockTime::from_mseconds(500),
                &[gst::MessageType::Error],
            )
            && let gst::MessageView::Error(err) = msg.view()
        {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                "GStreamer error during recording start"
            );
            let _ = self.pipeline.set_state(gst::State::Null);
            self.discard_file();
            return Err(EncodeError::Failure(format!(
                "recording start error: {}",
                err.error()
            )));
        }

        Ok(())
    }

    /// Push one converted frame into the recording
    ///
    /// Timestamps are synthesized at the configured framerate; the muxer
    /// sees a constant-rate stream regardless of capture jitter.
    pub fn push_frame(&mut self, image: &ConvertedImage) -> Result<(), EncodeError> {
        if image.width != self.width || image.height != self.height {
            return Err(EncodeError::Failure(format!(
                "frame {}x{} does not match recording {}x{}",
                image.width, image.height, self.width, self.height
            )));
        }
        let rgba = image
            .rgba
            .as_ref()
            .ok_or_else(|| EncodeError::Failure("frame has no CPU pixels".into()))?;

        let pts = self.frames_pushed * self.frame_duration_ns;
        let mut buffer = gst::Buffer::from_mut_slice(rgba.as_ref().clone());
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| EncodeError::Failure("buffer not writable".into()))?;
            buffer_ref.set_pts(gst::ClockTime::from_nseconds(pts));
            buffer_ref.set_duration(gst::ClockTime::from_nseconds(self.frame_duration_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| EncodeError::Failure(format!("push frame: {:?}", e)))?;
        self.frames_pushed += 1;
        Ok(())
    }

    /// Orientation fixed at record start
    pub fn orientation(&self) -> RecordingOrientation {
        self.orientation
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Frames pushed so far
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    /// Stop recording and finalize the container
    ///
    /// Sends EOS and waits for the muxer to write its indexes. On any
    /// failure, including a finalize timeout, the partial file is removed
    /// and an error returned; the result is always a complete file or none.
    pub fn stop(self) -> Result<PathBuf, EncodeError> {
        info!(frames = self.frames_pushed, "Stopping video recording");

        if self.appsrc.end_of_stream().is_err() {
            warn!("Failed to send EOS through appsrc");
        }

        let finalized = match self.pipeline.bus() {
            Some(bus) => {
                match bus.timed_pop_filtered(
                    gst::ClockTime::from_seconds(5),
                    &[gst::MessageType::Eos, gst::MessageType::Error],
                ) {
                    Some(msg) => match msg.view() {
                        gst::MessageView::Eos(_) => true,
                        gst::MessageView::Error(err) => {
                            error!(error = %err.error(), "GStreamer error during finalize");
                            false
                        }
                        _ => false,
                    },
                    None => {
                        warn!("Timed out waiting for recording EOS");
                        false
                    }
                }
            }
            None => false,
        };

        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            error!(error = %e, "Failed to shut down recording pipeline");
        }

        if !finalized || self.frames_pushed == 0 {
            self.discard_file();
            return Err(EncodeError::Failure(
                "recording did not finalize; partial file discarded".into(),
            ));
        }

        info!(path = %self.file_path.display(), "Recording saved");
        Ok(self.file_path.clone())
    }

    /// Abandon the recording and remove any partial output
    pub fn abort(self) {
        info!("Aborting video recording");
        let _ = self.appsrc.end_of_stream();
        let _ = self.pipeline.set_state(gst::State::Null);
        self.discard_file();
    }

    fn discard_file(&self) {
        if self.file_path.exists() {
            match std::fs::remove_file(&self.file_path) {
                Ok(()) => debug!(path = %self.file_path.display(), "Discarded partial recording"),
                Err(e) => warn!(
                    path = %self.file_path.display(),
                    error = %e,
                    "Failed to remove partial recording"
                ),
            }
        }
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        // Pipeline teardown on drop; explicit stop()/abort() is the normal path
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
