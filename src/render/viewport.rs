// SPDX-License-Identifier: GPL-3.0-only

//! Aspect/crop calculation
//!
//! Pure geometry: no GPU or capture state is involved, so every edge case
//! is unit-testable. All math is in f32; callers round at the edges.

use crate::errors::FitError;

/// A width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Computed crop/letterbox rectangle
///
/// A pure value: recomputed whenever viewport size, source size, or target
/// aspect ratio changes, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The empty rectangle returned alongside invalid-configuration errors
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Largest rectangle with the target aspect ratio that fits `boundary`,
/// centered within `viewport`
///
/// Ties between equally-large candidates resolve by fitting width first,
/// then height: the rect spans the boundary's full width unless that would
/// overflow its height. `source` is the frame's native size; it takes part
/// in validation only, since the caller chooses whether `target_aspect`
/// follows the source or overrides it.
///
/// Returns an error (never NaN, never a division by zero) when any
/// dimension is non-positive or the aspect ratio is not a positive finite
/// number.
pub fn fit(
    source: Size,
    viewport: Size,
    boundary: Size,
    target_aspect: f32,
) -> Result<ViewportRect, FitError> {
    if !source.is_valid() {
        return Err(FitError(format!(
            "source size {}x{} is not positive",
            source.width, source.height
        )));
    }
    if !viewport.is_valid() {
        return Err(FitError(format!(
            "viewport size {}x{} is not positive",
            viewport.width, viewport.height
        )));
    }
    if !boundary.is_valid() {
        return Err(FitError(format!(
            "boundary size {}x{} is not positive",
            boundary.width, boundary.height
        )));
    }
    if !(target_aspect.is_finite() && target_aspect > 0.0) {
        return Err(FitError(format!(
            "target aspect ratio {} is not a positive finite number",
            target_aspect
        )));
    }

    // Width-first: span the boundary's width, shrink only if the height
    // overflows
    let mut width = boundary.width;
    let mut height = width / target_aspect;
    if height > boundary.height {
        height = boundary.height;
        width = height * target_aspect;
    }

    let x = (viewport.width - width) / 2.0;
    let y = (viewport.height - height) / 2.0;

    Ok(ViewportRect::new(x, y, width, height))
}

/// Letterbox a source frame into a canvas, preserving the frame's aspect
pub fn fit_frame(source: Size, canvas: Size) -> Result<ViewportRect, FitError> {
    fit(source, canvas, canvas, source.aspect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    #[test]
    fn worked_example_from_portrait_canvas() {
        // 640x480 source into a 1080x1920 canvas at the source's 480/640 ratio
        let rect = fit(
            Size::new(640.0, 480.0),
            Size::new(1080.0, 1920.0),
            Size::new(1080.0, 1920.0),
            480.0 / 640.0,
        )
        .unwrap();

        assert!((rect.width - 1080.0).abs() < EPS);
        assert!((rect.height - 1440.0).abs() < EPS);
        assert!((rect.x - 0.0).abs() < EPS);
        assert!((rect.y - 240.0).abs() < EPS);
    }

    #[test]
    fn matching_aspect_returns_boundary_unscaled() {
        let boundary = Size::new(1280.0, 720.0);
        let rect = fit(
            Size::new(1920.0, 1080.0),
            boundary,
            boundary,
            boundary.aspect(),
        )
        .unwrap();

        assert!((rect.width - 1280.0).abs() < EPS);
        assert!((rect.height - 720.0).abs() < EPS);
        assert!(rect.x.abs() < EPS && rect.y.abs() < EPS);
    }

    #[test]
    fn tall_aspect_fits_height_and_centers_horizontally() {
        let rect = fit(
            Size::new(100.0, 200.0),
            Size::new(1000.0, 500.0),
            Size::new(1000.0, 500.0),
            0.5,
        )
        .unwrap();

        assert!((rect.height - 500.0).abs() < EPS);
        assert!((rect.width - 250.0).abs() < EPS);
        assert!((rect.x - 375.0).abs() < EPS);
        assert!(rect.y.abs() < EPS);
    }

    #[test]
    fn zero_dimension_is_an_error_not_a_crash() {
        let err = fit(
            Size::new(0.0, 480.0),
            Size::new(100.0, 100.0),
            Size::new(100.0, 100.0),
            1.0,
        );
        assert!(err.is_err());

        let err = fit(
            Size::new(640.0, 480.0),
            Size::new(100.0, -5.0),
            Size::new(100.0, 100.0),
            1.0,
        );
        assert!(err.is_err());
    }

    #[test]
    fn non_finite_aspect_is_an_error() {
        let sizes = Size::new(100.0, 100.0);
        assert!(fit(sizes, sizes, sizes, f32::NAN).is_err());
        assert!(fit(sizes, sizes, sizes, f32::INFINITY).is_err());
        assert!(fit(sizes, sizes, sizes, 0.0).is_err());
        assert!(fit(sizes, sizes, sizes, -1.5).is_err());
    }

    #[test]
    fn result_always_contained_and_centered() {
        let source = Size::new(640.0, 480.0);
        for (bw, bh) in [(320.0, 240.0), (1080.0, 1920.0), (333.0, 777.0)] {
            for aspect in [0.25, 0.5625, 1.0, 1.7778, 4.0] {
                let boundary = Size::new(bw, bh);
                let rect = fit(source, boundary, boundary, aspect).unwrap();

                assert!(rect.width <= boundary.width + EPS);
                assert!(rect.height <= boundary.height + EPS);
                assert!((rect.aspect() - aspect).abs() < 1e-3 * aspect);
                // Centered: equal margins on both axes
                assert!((rect.x * 2.0 + rect.width - boundary.width).abs() < EPS);
                assert!((rect.y * 2.0 + rect.height - boundary.height).abs() < EPS);
            }
        }
    }

    #[test]
    fn fit_frame_letterboxes_landscape_into_portrait() {
        let rect = fit_frame(Size::new(640.0, 480.0), Size::new(480.0, 640.0)).unwrap();
        assert!((rect.width - 480.0).abs() < EPS);
        assert!((rect.height - 360.0).abs() < EPS);
        assert!((rect.y - 140.0).abs() < EPS);
    }
}
