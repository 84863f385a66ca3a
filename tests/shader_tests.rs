// SPDX-License-Identifier: GPL-3.0-only

//! WGSL shader validation
//!
//! Parses and validates the conversion shader with naga so a shader typo
//! fails in CI instead of at device creation on a user's machine.

use canvas_camera::shaders::YUV_TO_RGBA_SHADER;

#[test]
fn yuv_shader_parses_and_validates() {
    let module = naga::front::wgsl::parse_str(YUV_TO_RGBA_SHADER)
        .expect("yuv_to_rgba.wgsl failed to parse");

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .expect("yuv_to_rgba.wgsl failed validation");
}

#[test]
fn yuv_shader_has_expected_entry_point() {
    let module = naga::front::wgsl::parse_str(YUV_TO_RGBA_SHADER).unwrap();

    let entry = module
        .entry_points
        .iter()
        .find(|e| e.name == "main")
        .expect("missing main entry point");
    assert_eq!(entry.stage, naga::ShaderStage::Compute);
    // Workgroup size must match the dispatch math in the converter
    assert_eq!(entry.workgroup_size, [16, 16, 1]);
}
