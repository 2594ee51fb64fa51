//! Simulated Booster device for integration tests.
//!
//! The simulator scripts the device side of the mock transport: it answers
//! control requests from a drain-current model, applies settings writes to
//! its internal state, and acknowledges them, so the full client stack runs
//! against it unmodified.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boosterctl::transport::mock::MockTransport;
use boosterctl::transport::InboundMessage;
use boosterctl::TunerLimits;

/// Prefix of the simulated device.
pub const PREFIX: &str = "dt/sinara/booster/sim";

/// How the simulator produces drain-current readings.
pub enum CurrentSource {
    /// Current as a function of the commanded bias voltage.
    Curve(Box<dyn Fn(f64) -> f64 + Send>),
    /// A scripted sequence of readings, independent of voltage.
    Sequence(VecDeque<f64>),
}

struct SimState {
    voltage: f64,
    source: CurrentSource,
    settings_writes: Vec<(String, String)>,
}

/// Handle over the simulated device's state.
#[derive(Clone)]
pub struct SimBooster {
    state: Arc<Mutex<SimState>>,
}

impl SimBooster {
    /// Install a simulator answering on `transport` with the given current
    /// source.
    pub fn install(transport: &MockTransport, source: CurrentSource) -> Self {
        let sim = Self {
            state: Arc::new(Mutex::new(SimState {
                voltage: 0.0,
                source,
                settings_writes: Vec::new(),
            })),
        };

        let responder_state = sim.state.clone();
        transport.set_responder(move |request| {
            let reply_topic = request.response_topic.clone()?;
            let mut state = responder_state.lock().ok()?;

            let payload = if request.topic == format!("{PREFIX}/control") {
                handle_control(&mut state, &request.payload)
            } else if let Some(path) = request
                .topic
                .strip_prefix(&format!("{PREFIX}/settings/"))
            {
                handle_settings(&mut state, path, &request.payload)
            } else {
                return None;
            };

            Some(InboundMessage {
                topic: reply_topic,
                payload,
            })
        });

        sim
    }

    /// Simulator with a current-vs-voltage curve.
    pub fn with_curve<F>(transport: &MockTransport, curve: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + 'static,
    {
        Self::install(transport, CurrentSource::Curve(Box::new(curve)))
    }

    /// Simulator replaying a fixed sequence of current readings.
    pub fn with_readings(transport: &MockTransport, readings: &[f64]) -> Self {
        Self::install(
            transport,
            CurrentSource::Sequence(readings.iter().copied().collect()),
        )
    }

    /// The most recently commanded bias voltage.
    pub fn voltage(&self) -> f64 {
        self.state.lock().unwrap().voltage
    }

    /// All settings writes seen so far, as (path, raw payload) pairs.
    pub fn settings_writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().settings_writes.clone()
    }

    /// Number of bias-voltage writes seen so far.
    pub fn bias_write_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .settings_writes
            .iter()
            .filter(|(path, _)| path.ends_with("/bias_voltage"))
            .count()
    }
}

fn handle_control(state: &mut SimState, payload: &[u8]) -> Vec<u8> {
    let Ok(request) = serde_json::from_slice::<serde_json::Value>(payload) else {
        return error_response(400, "malformed request");
    };

    match request["action"].as_str() {
        Some("ReadBiasCurrent") => {
            let vgs = state.voltage;
            let ids = match &mut state.source {
                CurrentSource::Curve(curve) => quantize(curve(vgs)),
                CurrentSource::Sequence(readings) => match readings.pop_front() {
                    Some(ids) => ids,
                    None => return error_response(503, "reading sequence exhausted"),
                },
            };
            let msg = format!(r#"{{"vgs": {vgs}, "ids": {ids}}}"#);
            serde_json::to_vec(&serde_json::json!({"code": 200, "msg": msg})).unwrap()
        }
        Some("Save") => br#"{"code": 200, "msg": ""}"#.to_vec(),
        _ => error_response(400, "unknown action"),
    }
}

fn handle_settings(state: &mut SimState, path: &str, payload: &[u8]) -> Vec<u8> {
    let raw = String::from_utf8_lossy(payload).into_owned();

    if path.ends_with("/bias_voltage") {
        match serde_json::from_slice::<f64>(payload) {
            Ok(voltage) => state.voltage = voltage,
            Err(_) => return error_response(400, "bad bias voltage"),
        }
    }
    state.settings_writes.push((path.to_string(), raw));

    br#"{"code": 200, "msg": ""}"#.to_vec()
}

fn error_response(code: u32, msg: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({"code": code, "msg": msg})).unwrap()
}

/// Quantize a simulated current to the device's 1 µA ADC resolution.
///
/// This keeps threshold comparisons exact at boundary readings like
/// "ids = 0.05" instead of depending on accumulated float error.
pub fn quantize(ids: f64) -> f64 {
    (ids * 1e6).round() / 1e6
}

/// Tuner limits with the settle delays zeroed for simulation.
pub fn fast_limits() -> TunerLimits {
    TunerLimits {
        power_settle: Duration::ZERO,
        measure_settle: Duration::ZERO,
        ..TunerLimits::default()
    }
}
