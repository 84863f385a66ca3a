// SPDX-License-Identifier: GPL-3.0-only

//! Capture session: owns the camera pipeline and delivers raw frames
//!
//! A session wraps a GStreamer pipeline `v4l2src ! videoconvert !
//! capsfilter ! appsink` forced to a planar YUV format at the requested
//! resolution and framerate. The appsink hands each mapped buffer to the
//! [`DeliverySlot`] as a [`RawFrame`]; the sink itself is bounded and
//! dropping, so a stalled consumer never backs up into the driver.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use super::enumeration;
use super::frame_loop::DeliverySlot;
use super::types::{CameraDevice, CameraResult, FrameData, Framerate, PixelFormat, RawFrame, YuvPlanes};
use crate::config::{CaptureOptions, LensFacing};
use crate::constants::APPSINK_MAX_BUFFERS;
use crate::errors::CameraError;

/// An active capture session
///
/// Created by [`CameraSession::start`]; frames flow until [`stop`] tears the
/// pipeline down. Restarting (e.g. for a lens switch) invalidates any frame
/// still in flight; holders must use [`RawFrame::to_copied`] to outlive it.
///
/// [`stop`]: CameraSession::stop
pub struct CameraSession {
    pipeline: gst::Pipeline,
    device: CameraDevice,
    facing: LensFacing,
    width: u32,
    height: u32,
    framerate: Framerate,
    slot: Arc<DeliverySlot<RawFrame>>,
}

impl CameraSession {
    /// Open the camera for the requested facing and start frame delivery
    pub fn start(options: &CaptureOptions) -> CameraResult<Self> {
        gst::init().map_err(|e| CameraError::PipelineFailed(format!("gstreamer init: {}", e)))?;

        let device = enumeration::select_device(options.camera_facing)?;
        Self::check_device_access(&device)?;

        let framerate = Framerate::from_int(options.fps);
        let slot = Arc::new(DeliverySlot::new());

        info!(
            device = %device.path,
            card = %device.card,
            width = options.width,
            height = options.height,
            fps = %framerate,
            facing = %options.camera_facing,
            "Starting capture session"
        );

        let pipeline =
            Self::build_pipeline(&device, options.width, options.height, framerate, &slot)?;

        Self::set_playing(&pipeline)?;

        Ok(Self {
            pipeline,
            device,
            facing: options.camera_facing,
            width: options.width,
            height: options.height,
            framerate,
            slot,
        })
    }

    /// Distinguish a missing device from one we may not open
    fn check_device_access(device: &CameraDevice) -> CameraResult<()> {
        match std::fs::File::open(&device.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                CameraError::PermissionDenied(format!("{} is not readable", device.path)),
            ),
            Err(e) => Err(CameraError::DeviceUnavailable(format!(
                "{}: {}",
                device.path, e
            ))),
        }
    }

    fn build_pipeline(
        device: &CameraDevice,
        width: u32,
        height: u32,
        framerate: Framerate,
        slot: &Arc<DeliverySlot<RawFrame>>,
    ) -> CameraResult<gst::Pipeline> {
        let pipeline = gst::Pipeline::new();

        let source = gst::ElementFactory::make("v4l2src")
            .property("device", &device.path)
            .build()
            .map_err(|e| CameraError::PipelineFailed(format!("create v4l2src: {}", e)))?;

        // Normalizes whatever the sensor produces to a planar YUV layout;
        // it does not rescale, so an unsupported resolution still fails
        // caps negotiation rather than being silently fixed up.
        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| CameraError::PipelineFailed(format!("create videoconvert: {}", e)))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", PixelFormat::Nv12.to_gst_format_string())
            .field("width", width as i32)
            .field("height", height as i32)
            .field(
                "framerate",
                gst::Fraction::new(framerate.num as i32, framerate.denom as i32),
            )
            .build();

        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &caps)
            .build()
            .map_err(|e| CameraError::PipelineFailed(format!("create capsfilter: {}", e)))?;

        let appsink = gst::ElementFactory::make("appsink")
            .build()
            .map_err(|e| CameraError::PipelineFailed(format!("create appsink: {}", e)))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| CameraError::PipelineFailed("appsink cast failed".into()))?;

        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", APPSINK_MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        let slot = Arc::clone(slot);
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    match raw_frame_from_sample(sample) {
                        Ok(frame) => {
                            if slot.offer(frame).is_some() {
                                trace!("Delivery backpressure: displaced unconsumed frame");
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping undecodable sample"),
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        let elements: [&gst::Element; 4] = [
            &source,
            &videoconvert,
            &capsfilter,
            appsink.upcast_ref::<gst::Element>(),
        ];

        pipeline
            .add_many(elements)
            .map_err(|e| CameraError::PipelineFailed(format!("add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|_| CameraError::PipelineFailed("link capture chain".into()))?;

        Ok(pipeline)
    }

    /// Bring the pipeline up, mapping early bus errors onto error kinds
    fn set_playing(pipeline: &gst::Pipeline) -> CameraResult<()> {
        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| CameraError::PipelineFailed(format!("set playing: {}", e)))?;

        let Some(bus) = pipeline.bus() else {
            return Ok(());
        };

        if let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(500),
            &[gst::MessageType::Error],
        ) && let gst::MessageView::Error(err) = msg.view()
        {
            let text = err.error().to_string();
            let _ = pipeline.set_state(gst::State::Null);

            // Caps refusal means the device cannot do what was asked
            let lowered = text.to_ascii_lowercase();
            if lowered.contains("negotiat") || lowered.contains("format") {
                return Err(CameraError::UnsupportedConfiguration(text));
            }
            return Err(CameraError::DeviceUnavailable(text));
        }

        Ok(())
    }

    /// The delivery slot frames arrive through
    pub fn slot(&self) -> Arc<DeliverySlot<RawFrame>> {
        Arc::clone(&self.slot)
    }

    /// Device node used for control ioctls
    pub fn device_path(&self) -> &str {
        &self.device.path
    }

    /// Which way the active lens faces
    pub fn facing(&self) -> LensFacing {
        self.facing
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    /// Tear the session down, invalidating frames in flight
    pub fn stop(self) {
        info!(device = %self.device.path, "Stopping capture session");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to stop capture pipeline");
        }
        debug!(dropped = self.slot.dropped_count(), "Capture session stopped");
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Build a [`RawFrame`] from an appsink sample without copying pixel data
fn raw_frame_from_sample(sample: gst::Sample) -> Result<RawFrame, String> {
    let caps = sample.caps().ok_or("sample without caps")?;
    let video_info = VideoInfo::from_caps(caps).map_err(|e| format!("bad caps: {}", e))?;

    let format = PixelFormat::from_gst_format(video_info.format().to_str())
        .ok_or_else(|| format!("unexpected format {}", video_info.format()))?;

    let width = video_info.width();
    let height = video_info.height();
    let offsets = video_info.offset();
    let strides = video_info.stride();

    let planes = match format {
        PixelFormat::Nv12 | PixelFormat::Nv21 => YuvPlanes {
            y_offset: offsets[0],
            y_stride: strides[0] as u32,
            uv_offset: offsets[1],
            uv_stride: strides[1] as u32,
            v_offset: 0,
            v_stride: 0,
            uv_width: width.div_ceil(2),
            uv_height: height.div_ceil(2),
        },
        PixelFormat::I420 => YuvPlanes {
            y_offset: offsets[0],
            y_stride: strides[0] as u32,
            uv_offset: offsets[1],
            uv_stride: strides[1] as u32,
            v_offset: offsets[2],
            v_stride: strides[2] as u32,
            uv_width: width.div_ceil(2),
            uv_height: height.div_ceil(2),
        },
    };

    let buffer = sample.buffer_owned().ok_or("sample without buffer")?;
    let pts_ns = buffer.pts().map(|t| t.nseconds());
    let mapped = buffer
        .into_mapped_buffer_readable()
        .map_err(|_| "buffer map failed".to_string())?;

    Ok(RawFrame {
        width,
        height,
        data: FrameData::from_mapped_buffer(mapped),
        format,
        planes,
        pts_ns,
        captured_at: Instant::now(),
    })
}
