// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the aspect/crop calculator

use canvas_camera::render::{Size, fit, fit_frame};

const EPS: f32 = 1e-3;

#[test]
fn contained_centered_and_aspect_preserving() {
    let source = Size::new(640.0, 480.0);
    let cases = [
        (Size::new(1080.0, 1920.0), 0.75),
        (Size::new(1920.0, 1080.0), 16.0 / 9.0),
        (Size::new(500.0, 500.0), 1.0),
        (Size::new(123.0, 457.0), 2.5),
        (Size::new(300.0, 200.0), 0.1),
    ];

    for (boundary, aspect) in cases {
        let rect = fit(source, boundary, boundary, aspect).unwrap();

        // Fully contained
        assert!(rect.width <= boundary.width + EPS, "width overflows boundary");
        assert!(rect.height <= boundary.height + EPS, "height overflows boundary");
        assert!(rect.x >= -EPS || rect.width <= boundary.width + EPS);

        // Matches the target aspect within tolerance
        assert!(
            (rect.aspect() - aspect).abs() < 1e-3 * aspect,
            "aspect {} != target {}",
            rect.aspect(),
            aspect
        );

        // Centered: symmetric margins
        assert!((rect.x * 2.0 + rect.width - boundary.width).abs() < EPS);
        assert!((rect.y * 2.0 + rect.height - boundary.height).abs() < EPS);

        // Maximal: one dimension spans the boundary
        let spans_width = (rect.width - boundary.width).abs() < EPS;
        let spans_height = (rect.height - boundary.height).abs() < EPS;
        assert!(spans_width || spans_height);
    }
}

#[test]
fn boundary_aspect_returns_boundary_unchanged() {
    let boundary = Size::new(1080.0, 1920.0);
    let rect = fit(
        Size::new(640.0, 480.0),
        boundary,
        boundary,
        boundary.aspect(),
    )
    .unwrap();

    assert!((rect.x).abs() < EPS);
    assert!((rect.y).abs() < EPS);
    assert!((rect.width - boundary.width).abs() < EPS);
    assert!((rect.height - boundary.height).abs() < EPS);
}

#[test]
fn documented_portrait_example() {
    // boundary (1080, 1920), source (640, 480), aspect 480/640
    // expected: centered, 1080 wide, 1440 tall
    let rect = fit(
        Size::new(640.0, 480.0),
        Size::new(1080.0, 1920.0),
        Size::new(1080.0, 1920.0),
        480.0 / 640.0,
    )
    .unwrap();

    assert!((rect.width - 1080.0).abs() < EPS);
    assert!((rect.height - 1440.0).abs() < EPS);
    assert!((rect.x).abs() < EPS);
    assert!((rect.y - 240.0).abs() < EPS);
}

#[test]
fn invalid_inputs_error_without_nan() {
    let good = Size::new(100.0, 100.0);

    for bad in [
        Size::new(0.0, 100.0),
        Size::new(100.0, 0.0),
        Size::new(-1.0, 100.0),
        Size::new(f32::NAN, 100.0),
        Size::new(f32::INFINITY, 100.0),
    ] {
        assert!(fit(bad, good, good, 1.0).is_err(), "source {:?}", bad);
        assert!(fit(good, bad, good, 1.0).is_err(), "viewport {:?}", bad);
        assert!(fit(good, good, bad, 1.0).is_err(), "boundary {:?}", bad);
    }

    for bad_aspect in [0.0, -2.0, f32::NAN, f32::INFINITY] {
        assert!(fit(good, good, good, bad_aspect).is_err());
    }
}

#[test]
fn ties_prefer_width() {
    // A square boundary with a square aspect could fit either way; the
    // width-first rule spans the full width
    let boundary = Size::new(200.0, 200.0);
    let rect = fit(Size::new(50.0, 50.0), boundary, boundary, 1.0).unwrap();
    assert!((rect.width - 200.0).abs() < EPS);
    assert!((rect.height - 200.0).abs() < EPS);
}

#[test]
fn frame_letterboxing_matches_manual_fit() {
    let rect = fit_frame(Size::new(1920.0, 1080.0), Size::new(640.0, 640.0)).unwrap();
    // 16:9 frame in a square canvas: full width, centered band
    assert!((rect.width - 640.0).abs() < EPS);
    assert!((rect.height - 360.0).abs() < EPS);
    assert!((rect.y - 140.0).abs() < EPS);
}
