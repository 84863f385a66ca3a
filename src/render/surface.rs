// SPDX-License-Identifier: GPL-3.0-only

//! Render surface holding the latest converted frame
//!
//! One exclusive writer (the delivery path) and any number of repaint
//! callers share a [`RenderSurface`] through a single mutex, the render
//! lock. The lock is held only for the update/draw itself, never across a
//! capture wait, so delivery is never stalled by a repaint.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};
use std::sync::{Arc, Mutex};
use tracing::trace;

use super::viewport::{Size, ViewportRect, fit_frame};
use crate::shaders::ConvertedImage;

/// The render lock: both the delivery and repaint contexts go through it
pub type SharedSurface = Arc<Mutex<RenderSurface>>;

/// CPU framebuffer target composited from the latest converted frame
pub struct RenderSurface {
    width: u32,
    height: u32,
    rect: ViewportRect,
    latest: Option<Arc<ConvertedImage>>,
    /// RGBA canvas contents, `width * height * 4` bytes
    framebuffer: Vec<u8>,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rect: ViewportRect::empty(),
            latest: None,
            framebuffer: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    /// Wrap in the shared render lock
    pub fn into_shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }

    /// Draw a converted frame into the surface at the given rectangle
    ///
    /// Atomically replaces the latest-frame reference; the previous image
    /// is superseded and dropped once its last consumer releases it. Must
    /// be called with the render lock held, which the [`SharedSurface`]
    /// type enforces structurally.
    pub fn draw(&mut self, image: Arc<ConvertedImage>, rect: ViewportRect) {
        self.rect = rect;
        self.latest = Some(image);
        self.composite();
    }

    /// Repaint the framebuffer from the latest frame (e.g. host-requested
    /// redraw with unchanged geometry)
    pub fn redraw(&mut self) {
        self.composite();
    }

    /// Resize the viewport, recomputing the rectangle from the latest frame
    ///
    /// Does not touch in-flight conversions; the next delivery simply draws
    /// with the new geometry.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.framebuffer = vec![0; (width as usize) * (height as usize) * 4];

        if let Some(image) = &self.latest {
            let source = Size::from((image.width, image.height));
            if let Ok(rect) = fit_frame(source, Size::from((width, height))) {
                self.rect = rect;
            }
        }
        self.composite();
    }

    /// Latest converted frame, if any
    pub fn latest(&self) -> Option<Arc<ConvertedImage>> {
        self.latest.clone()
    }

    /// Current draw rectangle
    pub fn rect(&self) -> ViewportRect {
        self.rect
    }

    /// Viewport size in pixels
    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Current canvas contents
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Drop the latest frame reference (session teardown)
    pub fn clear(&mut self) {
        self.latest = None;
        self.framebuffer.fill(0);
    }

    fn composite(&mut self) {
        let Some(image) = &self.latest else {
            return;
        };
        // Texture-only frames keep the reference current but skip the CPU
        // composite; the canvas retains its previous contents
        let Some(rgba) = image.rgba.as_ref() else {
            trace!("Latest frame has no CPU pixels; composite skipped");
            return;
        };
        if self.rect.is_empty() {
            return;
        }

        let Some(src) = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(
            image.width,
            image.height,
            rgba.as_slice(),
        ) else {
            return;
        };

        let dst_w = self.rect.width.round().max(1.0) as u32;
        let dst_h = self.rect.height.round().max(1.0) as u32;
        let scaled = imageops::resize(&src, dst_w, dst_h, FilterType::Triangle);

        self.framebuffer.fill(0);
        blit(
            &mut self.framebuffer,
            self.width,
            self.height,
            &scaled,
            self.rect.x.round() as i64,
            self.rect.y.round() as i64,
        );
    }
}

/// Copy `src` into the framebuffer at (x, y), clipping to the bounds
fn blit(
    framebuffer: &mut [u8],
    fb_width: u32,
    fb_height: u32,
    src: &ImageBuffer<Rgba<u8>, Vec<u8>>,
    x: i64,
    y: i64,
) {
    let (src_w, src_h) = src.dimensions();
    let src_bytes = src.as_raw();

    for row in 0..src_h as i64 {
        let dst_y = y + row;
        if dst_y < 0 || dst_y >= fb_height as i64 {
            continue;
        }

        let src_x_start = (-x).max(0) as u32;
        let dst_x_start = x.max(0);
        if src_x_start >= src_w || dst_x_start >= fb_width as i64 {
            continue;
        }
        let run = (src_w - src_x_start).min((fb_width as i64 - dst_x_start) as u32) as usize;

        let src_off = (row as usize * src_w as usize + src_x_start as usize) * 4;
        let dst_off = (dst_y as usize * fb_width as usize + dst_x_start as usize) * 4;
        framebuffer[dst_off..dst_off + run * 4]
            .copy_from_slice(&src_bytes[src_off..src_off + run * 4]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_image(width: u32, height: u32, fill: u8) -> Arc<ConvertedImage> {
        Arc::new(ConvertedImage {
            width,
            height,
            texture: None,
            rgba: Some(Arc::new(vec![fill; (width * height * 4) as usize])),
            pts_ns: Some(0),
            captured_at: Instant::now(),
        })
    }

    #[test]
    fn draw_replaces_latest_atomically() {
        let mut surface = RenderSurface::new(100, 100);
        let first = test_image(10, 10, 1);
        let second = test_image(10, 10, 2);

        surface.draw(first, ViewportRect::new(0.0, 0.0, 100.0, 100.0));
        surface.draw(Arc::clone(&second), ViewportRect::new(0.0, 0.0, 100.0, 100.0));

        let latest = surface.latest().unwrap();
        assert!(Arc::ptr_eq(&latest, &second));
        // Framebuffer reflects the second image everywhere
        assert!(surface.framebuffer().iter().all(|&b| b == 2));
    }

    #[test]
    fn composite_letterboxes_and_clears_margins() {
        let mut surface = RenderSurface::new(100, 100);
        let image = test_image(10, 5, 9);
        // Centered half-height band
        surface.draw(image, ViewportRect::new(0.0, 25.0, 100.0, 50.0));

        let fb = surface.framebuffer();
        // Top margin is cleared
        assert!(fb[..100 * 25 * 4].iter().all(|&b| b == 0));
        // Band contains image data
        let mid = (100 * 50 + 50) * 4;
        assert_eq!(fb[mid], 9);
    }

    #[test]
    fn resize_recomputes_rect_from_latest() {
        let mut surface = RenderSurface::new(100, 100);
        let image = test_image(20, 10, 5);
        surface.draw(image, ViewportRect::new(0.0, 25.0, 100.0, 50.0));

        surface.resize(200, 200);
        let rect = surface.rect();
        // 2:1 frame in a square viewport spans width, centers vertically
        assert!((rect.width - 200.0).abs() < 1e-3);
        assert!((rect.height - 100.0).abs() < 1e-3);
        assert!((rect.y - 50.0).abs() < 1e-3);
    }
}
