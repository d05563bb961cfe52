use runtime::EventBus;

use crate::error::AcquireError;

/// User-facing notices raised by the background components.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    SharingStarted,
    SharingStopped,
    /// A fix was obtained but its accuracy radius exceeds the threshold.
    LowAccuracy { accuracy_m: f64 },
    /// Terminal until the user changes a platform setting.
    PermissionDenied,
    /// Acquisition gave up after every profile.
    SharingFailed { reason: String },
    RouteUnavailable { target: String, reason: String },
}

impl Notice {
    pub fn from_acquire_error(err: &AcquireError) -> Self {
        match err {
            AcquireError::PermissionDenied(_) => Notice::PermissionDenied,
            other => Notice::SharingFailed {
                reason: other.to_string(),
            },
        }
    }
}

pub type NoticeBus = EventBus<Notice>;
