// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the options payload boundary

use canvas_camera::config::{CaptureOptions, LensFacing, UseMode};
use serde_json::json;

#[test]
fn empty_payload_yields_documented_defaults() {
    let options = CaptureOptions::from_payload(&json!({})).unwrap();
    assert_eq!(options.width, 352);
    assert_eq!(options.height, 288);
    assert_eq!(options.fps, 30);
    assert_eq!(options.use_mode, UseMode::File);
    assert_eq!(options.camera_facing, LensFacing::Front);
    assert!(options.has_thumbnail);
    assert!(!options.disable_fullsize);
    assert!(!options.generate_output_only_on_request);
}

#[test]
fn unknown_keys_are_ignored() {
    let options = CaptureOptions::from_payload(&json!({
        "fps": 24,
        "someFutureKey": { "nested": true }
    }))
    .unwrap();
    assert_eq!(options.fps, 24);
}

#[test]
fn canvas_and_capture_sizes_flow_through() {
    let options = CaptureOptions::from_payload(&json!({
        "width": 640,
        "height": 480,
        "canvas": { "width": 1080, "height": 1920 },
        "capture": { "width": 1920, "height": 1080 }
    }))
    .unwrap();

    assert_eq!(options.canvas_size(), (1080, 1920));
    assert_eq!(options.capture_size(), (1920, 1080));
}

#[test]
fn sizes_default_to_capture_dimensions() {
    let options = CaptureOptions::from_payload(&json!({ "width": 640, "height": 480 })).unwrap();
    assert_eq!(options.canvas_size(), (640, 480));
    assert_eq!(options.capture_size(), (640, 480));
}

#[test]
fn invalid_combinations_fail_the_command() {
    for payload in [
        json!({ "fps": 0 }),
        json!({ "width": 0 }),
        json!({ "height": 0 }),
        json!({ "canvas": { "width": 0, "height": 100 } }),
        json!({ "capture": { "width": 100, "height": 0 } }),
        json!({ "thumbnailRatio": 2.0 }),
        json!({ "pointOfInterest": { "x": 1.5, "y": 0.5 } }),
        json!({ "use": "telepathy" }),
    ] {
        assert!(
            CaptureOptions::from_payload(&payload).is_err(),
            "payload should be rejected: {}",
            payload
        );
    }
}

#[test]
fn options_round_trip_through_serialization() {
    let mut options = CaptureOptions::default();
    options.camera_facing = LensFacing::Back;
    options.disable_fullsize = true;

    let payload = serde_json::to_value(&options).unwrap();
    let parsed = CaptureOptions::from_payload(&payload).unwrap();
    assert_eq!(parsed, options);
}
