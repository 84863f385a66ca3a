// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for managing photo and video output files
//!
//! All output lands in one media directory, named with a session-derived
//! suffix so concurrent or successive sessions never collide.

use std::path::PathBuf;
use tracing::{debug, warn};

/// Output categories with their filename prefixes and extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Fullsize,
    Thumbnail,
    Video,
}

impl OutputKind {
    fn prefix(&self) -> &'static str {
        match self {
            OutputKind::Fullsize => "IMG",
            OutputKind::Thumbnail => "THUMB",
            OutputKind::Video => "VID",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            OutputKind::Fullsize | OutputKind::Thumbnail => "jpg",
            OutputKind::Video => "mp4",
        }
    }
}

/// Resolve the media output directory, creating it if needed
///
/// Prefers the user cache location; falls back to the system temp dir when
/// no cache directory is available (sandboxed hosts).
pub fn media_dir() -> std::io::Result<PathBuf> {
    let dir = dirs::cache_dir()
        .map(|d| d.join("canvas-camera"))
        .unwrap_or_else(|| std::env::temp_dir().join("canvas-camera"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Session-unique filename suffix: wall-clock timestamp plus a short random id
///
/// The timestamp keeps files sortable; the id guards against two sessions
/// starting within the same second.
pub fn session_suffix() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", timestamp, &id[..8])
}

/// Path for a one-shot or recording output file
pub fn output_path(dir: &std::path::Path, kind: OutputKind, suffix: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", kind.prefix(), suffix, kind.extension()))
}

/// Path for a per-frame preview file
///
/// Preview frames cycle through a fixed ring of filenames per session so
/// `file` output mode cannot fill the disk.
pub fn preview_path(
    dir: &std::path::Path,
    kind: OutputKind,
    suffix: &str,
    frame_index: u64,
) -> PathBuf {
    let slot = frame_index % crate::constants::PREVIEW_FILE_RING;
    dir.join(format!(
        "{}_{}_{}.{}",
        kind.prefix(),
        suffix,
        slot,
        kind.extension()
    ))
}

/// Remove all files this session wrote to the media directory
///
/// Called on stop-capture. Recording outputs are kept; only preview and
/// one-shot stills matching the session suffix are removed.
pub fn cleanup_session(dir: &std::path::Path, suffix: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let is_session_still = (name.starts_with("IMG_") || name.starts_with("THUMB_"))
            && name.contains(suffix);
        if !is_session_still {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => debug!(file = %name, "Removed session output file"),
            Err(e) => warn!(file = %name, error = %e, "Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_are_unique() {
        let a = session_suffix();
        let b = session_suffix();
        assert_ne!(a, b);
    }

    #[test]
    fn output_paths_carry_kind_and_suffix() {
        let dir = std::path::Path::new("/tmp/media");
        let path = output_path(dir, OutputKind::Video, "20260101_120000_abcd1234");
        assert_eq!(
            path,
            PathBuf::from("/tmp/media/VID_20260101_120000_abcd1234.mp4")
        );
    }

    #[test]
    fn preview_paths_cycle_a_bounded_ring() {
        let dir = std::path::Path::new("/tmp/media");
        let ring = crate::constants::PREVIEW_FILE_RING;
        let first = preview_path(dir, OutputKind::Fullsize, "s", 0);
        let wrapped = preview_path(dir, OutputKind::Fullsize, "s", ring);
        assert_eq!(first, wrapped);

        let distinct: std::collections::HashSet<_> =
            (0..ring * 3).map(|i| preview_path(dir, OutputKind::Fullsize, "s", i)).collect();
        assert_eq!(distinct.len() as u64, ring);
    }

    #[test]
    fn cleanup_removes_only_session_stills() {
        let dir = std::env::temp_dir().join(format!("canvas-camera-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let keep_video = dir.join("VID_session1.mp4");
        let keep_other = dir.join("IMG_other_0.jpg");
        let remove_me = dir.join("IMG_session1_0.jpg");
        for p in [&keep_video, &keep_other, &remove_me] {
            std::fs::write(p, b"x").unwrap();
        }

        cleanup_session(&dir, "session1");

        assert!(keep_video.exists());
        assert!(keep_other.exists());
        assert!(!remove_me.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
