//! Remote control and bias calibration for Booster multi-channel RF
//! amplifiers.
//!
//! The crate layers a correlated request/response protocol
//! ([`command::CommandChannel`]) and a two-phase bias-voltage search
//! ([`tuner::BiasTuner`]) over a fire-and-forget pub/sub transport. The
//! transport itself sits behind the [`transport::Transport`] trait with an
//! MQTT 5 implementation for real devices and a scriptable mock for tests.

pub mod booster;
pub mod channel;
pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod settings;
pub mod telemetry;
pub mod transport;
pub mod tuner;

pub use booster::Booster;
pub use channel::{Channel, ChannelState};
pub use command::CommandChannel;
pub use error::{BoosterError, Result};
pub use protocol::{Action, BiasReading, ControlMessage, ControlResponse};
pub use tuner::{BiasTuner, TunerLimits};
