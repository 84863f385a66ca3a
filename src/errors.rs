// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture core
//!
//! Every failure surfaced across the plugin boundary carries one of the
//! [`ErrorKind`] values so the façade can map it to a stable error payload.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Stable error classification reported in outgoing error payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Camera access refused by the host
    PermissionDenied,
    /// No usable camera device, or the device went away
    DeviceUnavailable,
    /// Requested resolution/framerate/aspect combination was rejected
    UnsupportedConfiguration,
    /// GPU context or texture-cache failure
    ResourceExhausted,
    /// Still or video encoding failed
    EncodeFailure,
    /// The requested output is disabled by configuration
    FeatureDisabled,
}

impl ErrorKind {
    /// Stable identifier used in serialized error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::DeviceUnavailable => "device-unavailable",
            ErrorKind::UnsupportedConfiguration => "unsupported-configuration",
            ErrorKind::ResourceExhausted => "resource-exhausted",
            ErrorKind::EncodeFailure => "encode-failure",
            ErrorKind::FeatureDisabled => "feature-disabled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type aggregating all subsystems
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture source errors
    Camera(CameraError),
    /// Frame conversion errors
    Convert(ConvertError),
    /// Still/video encoding errors
    Encode(EncodeError),
    /// Aspect/crop computation errors
    Fit(FitError),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

impl AppError {
    /// Classify into the plugin-boundary error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Camera(e) => e.kind(),
            AppError::Convert(e) => e.kind(),
            AppError::Encode(e) => e.kind(),
            AppError::Fit(_) => ErrorKind::UnsupportedConfiguration,
            AppError::Storage(_) | AppError::Other(_) => ErrorKind::EncodeFailure,
        }
    }
}

/// Capture-source errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// Access to the device node was refused
    PermissionDenied(String),
    /// No camera found, or the device disappeared mid-session
    DeviceUnavailable(String),
    /// The capture pipeline refused the requested format
    UnsupportedConfiguration(String),
    /// Capture pipeline construction or state change failed
    PipelineFailed(String),
    /// A control (focus, exposure, zoom) could not be applied
    ControlFailed(String),
    /// No capture session is running
    NotCapturing,
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CameraError::DeviceUnavailable(_) | CameraError::NotCapturing => {
                ErrorKind::DeviceUnavailable
            }
            CameraError::UnsupportedConfiguration(_) | CameraError::ControlFailed(_) => {
                ErrorKind::UnsupportedConfiguration
            }
            CameraError::PipelineFailed(_) => ErrorKind::DeviceUnavailable,
        }
    }
}

/// Frame-conversion errors; each one causes that frame to be skipped
#[derive(Debug, Clone)]
pub enum ConvertError {
    /// Texture cache is full or GPU allocation failed
    ResourceExhausted(String),
    /// GPU device or queue is gone
    ContextLost(String),
    /// Frame data did not match its declared format/dimensions
    InvalidFrame(String),
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::ResourceExhausted(_) | ConvertError::ContextLost(_) => {
                ErrorKind::ResourceExhausted
            }
            ConvertError::InvalidFrame(_) => ErrorKind::UnsupportedConfiguration,
        }
    }
}

/// Still and video encoding errors; surfaced per request
#[derive(Debug, Clone)]
pub enum EncodeError {
    /// Image or video encoding failed
    Failure(String),
    /// Fullsize output is disabled by the start options
    FeatureDisabled,
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// Writing the output file failed
    Io(String),
}

impl EncodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::FeatureDisabled => ErrorKind::FeatureDisabled,
            _ => ErrorKind::EncodeFailure,
        }
    }
}

/// Invalid input to the aspect/crop calculator
#[derive(Debug, Clone, PartialEq)]
pub struct FitError(pub String);

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Convert(e) => write!(f, "Conversion error: {}", e),
            AppError::Encode(e) => write!(f, "Encoding error: {}", e),
            AppError::Fit(e) => write!(f, "Invalid viewport configuration: {}", e),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CameraError::UnsupportedConfiguration(msg) => {
                write!(f, "Unsupported configuration: {}", msg)
            }
            CameraError::PipelineFailed(msg) => write!(f, "Capture pipeline failed: {}", msg),
            CameraError::ControlFailed(msg) => write!(f, "Control failed: {}", msg),
            CameraError::NotCapturing => write!(f, "No capture session is running"),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            ConvertError::ContextLost(msg) => write!(f, "GPU context lost: {}", msg),
            ConvertError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Failure(msg) => write!(f, "Encoding failed: {}", msg),
            EncodeError::FeatureDisabled => write!(f, "Fullsize output is disabled"),
            EncodeError::RecordingInProgress => write!(f, "Recording already in progress"),
            EncodeError::NoRecordingInProgress => write!(f, "No recording in progress"),
            EncodeError::Io(msg) => write!(f, "Output I/O failed: {}", msg),
        }
    }
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for ConvertError {}
impl std::error::Error for EncodeError {}
impl std::error::Error for FitError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        AppError::Convert(err)
    }
}

impl From<EncodeError> for AppError {
    fn from(err: EncodeError) -> Self {
        AppError::Encode(err)
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::Fit(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_camera_error_maps_to_a_device_or_config_kind() {
        let cases = [
            (
                CameraError::PermissionDenied("x".into()),
                ErrorKind::PermissionDenied,
            ),
            (
                CameraError::DeviceUnavailable("x".into()),
                ErrorKind::DeviceUnavailable,
            ),
            (
                CameraError::UnsupportedConfiguration("x".into()),
                ErrorKind::UnsupportedConfiguration,
            ),
            (
                CameraError::PipelineFailed("x".into()),
                ErrorKind::DeviceUnavailable,
            ),
            (CameraError::NotCapturing, ErrorKind::DeviceUnavailable),
        ];
        for (error, kind) in cases {
            assert_eq!(AppError::from(error).kind(), kind);
        }
    }

    #[test]
    fn disabled_fullsize_is_not_an_encode_failure() {
        assert_eq!(
            AppError::from(EncodeError::FeatureDisabled).kind(),
            ErrorKind::FeatureDisabled
        );
        assert_eq!(
            AppError::from(EncodeError::Failure("x".into())).kind(),
            ErrorKind::EncodeFailure
        );
    }

    #[test]
    fn gpu_failures_surface_as_resource_exhaustion() {
        for error in [
            ConvertError::ResourceExhausted("cache full".into()),
            ConvertError::ContextLost("device gone".into()),
        ] {
            assert_eq!(AppError::from(error).kind(), ErrorKind::ResourceExhausted);
        }
        assert_eq!(
            AppError::from(ConvertError::InvalidFrame("short".into())).kind(),
            ErrorKind::UnsupportedConfiguration
        );
    }

    #[test]
    fn payload_kind_strings_are_stable() {
        assert_eq!(ErrorKind::PermissionDenied.as_str(), "permission-denied");
        assert_eq!(ErrorKind::FeatureDisabled.as_str(), "feature-disabled");
        assert_eq!(
            ErrorKind::UnsupportedConfiguration.to_string(),
            "unsupported-configuration"
        );
    }
}
