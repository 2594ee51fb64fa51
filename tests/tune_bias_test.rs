//! Bias tuning scenarios against a simulated device.

mod common;

use std::sync::Arc;
use std::time::Duration;

use boosterctl::booster::Booster;
use boosterctl::transport::mock::MockTransport;
use boosterctl::BoosterError;

use common::{fast_limits, quantize, SimBooster, PREFIX};

async fn connect(transport: &MockTransport) -> Booster {
    Booster::connect(
        Arc::new(transport.clone()),
        PREFIX,
        Duration::from_millis(250),
    )
    .await
    .unwrap()
}

/// A linear device with `ids(v) = max(0, v + 2.1) * 0.5`, tuned to 50 mA.
///
/// The coarse phase measures at -2.10, -2.08, ... and keeps going through
/// the exact-boundary reading at -2.00 (ids = 0.05 is not strictly greater
/// than the target), stopping at -1.98 where ids = 0.06. The fine phase then
/// descends in 1 mV steps back to -2.00.
#[tokio::test]
async fn test_linear_device_tunes_to_target() {
    let transport = MockTransport::new();
    let sim = SimBooster::with_curve(&transport, |v| 0.5 * (v + 2.1).max(0.0));
    let booster = connect(&transport).await;

    let reading = booster
        .tune_bias_with_limits(0, 0.05, fast_limits())
        .await
        .unwrap();

    assert!(reading.ids <= 0.05);
    assert!((reading.vgs - -2.0).abs() < 1e-9);

    // The crossing is bounded within one fine step: 1 mV above the returned
    // voltage the device would already exceed the target.
    let one_step_up = quantize(0.5 * (reading.vgs + 0.001 + 2.1).max(0.0));
    assert!(one_step_up > 0.05);

    // 7 coarse measurements (-2.10 ..= -1.98) + 20 fine (-1.981 ..= -2.000).
    assert_eq!(sim.bias_write_count(), 27);

    // The channel was powered before any bias traffic.
    let writes = sim.settings_writes();
    assert_eq!(writes[0].0, "channel/0/state");
    assert_eq!(writes[0].1, "\"Powered\"");
}

#[tokio::test]
async fn test_round_trip_crossing_bounded_by_fine_step() {
    let transport = MockTransport::new();
    let curve = |v: f64| 0.3 * (v + 2.1).max(0.0);
    let _sim = SimBooster::with_curve(&transport, curve);
    let booster = connect(&transport).await;

    let target = 0.033;
    let reading = booster
        .tune_bias_with_limits(3, target, fast_limits())
        .await
        .unwrap();

    assert!(reading.ids <= target);
    assert!(quantize(curve(reading.vgs + 0.001)) > target);
}

#[tokio::test]
async fn test_unreachable_target_aborts_on_voltage_bound() {
    let transport = MockTransport::new();
    // Too shallow to ever reach the target within the legal voltage range,
    // but staying under the current ceiling the whole way up.
    let _sim = SimBooster::with_curve(&transport, |v| 0.1 * (v + 2.1).max(0.0));
    let booster = connect(&transport).await;

    let err = booster
        .tune_bias_with_limits(0, 0.5, fast_limits())
        .await
        .unwrap_err();

    assert!(matches!(err, BoosterError::SafetyBoundsExceeded { .. }));
}

#[tokio::test]
async fn test_foldback_halts_before_any_further_voltage_change() {
    let transport = MockTransport::new();
    let sim = SimBooster::with_readings(&transport, &[0.01, 0.05, 0.01]);
    let booster = connect(&transport).await;

    let err = booster
        .tune_bias_with_limits(0, 0.1, fast_limits())
        .await
        .unwrap_err();

    match err {
        BoosterError::Foldback { ids, previous } => {
            assert!((ids - 0.01).abs() < 1e-12);
            assert!((previous - 0.05).abs() < 1e-12);
        }
        other => panic!("expected Foldback, got {other:?}"),
    }

    // The sweep stopped at the offending sample.
    assert_eq!(sim.bias_write_count(), 3);
}

#[tokio::test]
async fn test_over_current_in_coarse_phase() {
    let transport = MockTransport::new();
    let sim = SimBooster::with_readings(&transport, &[0.25]);
    let booster = connect(&transport).await;

    let err = booster
        .tune_bias_with_limits(0, 0.1, fast_limits())
        .await
        .unwrap_err();

    assert!(matches!(err, BoosterError::OverCurrent { ids } if (ids - 0.25).abs() < 1e-12));
    assert_eq!(sim.bias_write_count(), 1);
}

#[tokio::test]
async fn test_over_current_in_fine_phase() {
    let transport = MockTransport::new();
    // Rises normally through the target, then spikes on the first fine-phase
    // sample.
    let sim = SimBooster::with_readings(&transport, &[0.0, 0.04, 0.12, 0.25]);
    let booster = connect(&transport).await;

    let err = booster
        .tune_bias_with_limits(0, 0.1, fast_limits())
        .await
        .unwrap_err();

    assert!(matches!(err, BoosterError::OverCurrent { .. }));
    assert_eq!(sim.bias_write_count(), 4);
}

#[tokio::test]
async fn test_tune_rejects_invalid_channel_before_any_traffic() {
    let transport = MockTransport::new();
    let _sim = SimBooster::with_curve(&transport, |v| 0.5 * (v + 2.1).max(0.0));
    let booster = connect(&transport).await;

    let err = booster
        .tune_bias_with_limits(8, 0.05, fast_limits())
        .await
        .unwrap_err();

    assert!(matches!(err, BoosterError::InvalidChannel(8)));
    assert!(transport.published().is_empty());
}
