//! Device discovery over retained alive announcements.
//!
//! Every powered device publishes a retained marker on `<prefix>/alive`.
//! Discovery subscribes to `<filter>/alive`, collects announcements for a
//! fixed listen window, and returns the matching prefixes. Callers that
//! need exactly one device go through [`ensure_single`], which reports zero
//! and multiple matches as distinct, recoverable errors.

use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use crate::error::{BoosterError, Result};
use crate::transport::{filter_matches, Transport};

/// Default listen window for retained announcements.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_millis(500);

/// Collect the prefixes of all devices matching `filter`.
///
/// `filter` is a topic filter over device prefixes, e.g.
/// `dt/sinara/booster/+`. Prefixes are returned sorted and deduplicated.
pub async fn discover(
    transport: &dyn Transport,
    filter: &str,
    window: Duration,
) -> Result<Vec<String>> {
    let alive_filter = format!("{filter}/alive");
    let mut receiver = transport.subscribe(&alive_filter).await?;

    let deadline = Instant::now() + window;
    let mut prefixes = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, receiver.recv()).await {
            Ok(Some(message)) => {
                if !filter_matches(&alive_filter, &message.topic) {
                    continue;
                }
                // A retained empty payload is a tombstone for a device that
                // has deregistered.
                if message.payload.is_empty() {
                    continue;
                }
                let Some(prefix) = message.topic.strip_suffix("/alive") else {
                    continue;
                };
                debug!("discovered '{prefix}'");
                prefixes.push(prefix.to_string());
            }
            Ok(None) => return Err(BoosterError::TransportClosed),
            Err(_) => break,
        }
    }

    prefixes.sort();
    prefixes.dedup();
    Ok(prefixes)
}

/// Reduce a discovery result to the single expected device.
pub fn ensure_single(mut prefixes: Vec<String>, filter: &str) -> Result<String> {
    match prefixes.len() {
        0 => Err(BoosterError::NoDevices(filter.to_string())),
        1 => Ok(prefixes.remove(0)),
        _ => Err(BoosterError::MultipleDevices(prefixes)),
    }
}
