//! Custom error types for the application.
//!
//! This module defines the primary error type, `BoosterError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes of remote bias
//! calibration, from transport and protocol problems to the tuning safety
//! interlocks.
//!
//! Every tuning error is fatal to the current operation. There is no local
//! recovery or silent retry: continuing a sweep past an over-current or
//! foldback condition risks hardware damage, so errors carry the offending
//! values and propagate straight to the caller.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type Result<T> = std::result::Result<T, BoosterError>;

#[derive(Error, Debug)]
pub enum BoosterError {
    #[error("response delivered on unexpected topic '{topic}' (expected '{expected}')")]
    UnexpectedTopic { topic: String, expected: String },

    #[error("request failed with code {code}: {body}")]
    ActionFailed { code: u32, body: String },

    #[error("bias voltage {voltage:.3} V outside safe window [{lower:.3} V, {upper:.3} V]")]
    SafetyBoundsExceeded {
        voltage: f64,
        lower: f64,
        upper: f64,
    },

    #[error("drain current {ids:.3} A exceeds the hard current limit")]
    OverCurrent { ids: f64 },

    #[error("drain current folded back to {ids:.3} A from {previous:.3} A")]
    Foldback { ids: f64, previous: f64 },

    #[error("another command is already in flight on this channel")]
    ChannelBusy,

    #[error("no response received within {0:?}")]
    ResponseTimeout(Duration),

    #[error("channel index {0} out of range (0..=7)")]
    InvalidChannel(usize),

    #[error("no devices found matching '{0}'")]
    NoDevices(String),

    #[error("multiple devices found: {0:?}; select one with --prefix")]
    MultipleDevices(Vec<String>),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport delivery path closed")]
    TransportClosed,

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),
}
