//! Command-line front end for Booster RF channel configuration.
//!
//! The positional argument is the channel index. For example, to tune
//! channel 0 to 50 mA and persist the result:
//!
//! ```text
//! boosterctl 0 --bias 0.05 --save
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use boosterctl::booster::Booster;
use boosterctl::channel::ChannelState;
use boosterctl::config::Settings;
use boosterctl::discovery;
use boosterctl::telemetry::TelemetryReader;
use boosterctl::transport::{MqttTransport, Transport};
use boosterctl::Channel;

/// Modify booster RF channel configuration.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The channel index to operate on.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=7))]
    channel: u8,

    /// Tune the channel bias current to the provided value in amperes.
    #[arg(long)]
    bias: Option<f64>,

    /// Set the channel operating state.
    #[arg(long, value_enum)]
    state: Option<ChannelState>,

    /// Print the next telemetry packet for the channel.
    #[arg(long)]
    telemetry: bool,

    /// Save the channel configuration to device flash.
    #[arg(long)]
    save: bool,

    /// Device prefix; discovered automatically when omitted.
    #[arg(long)]
    prefix: Option<String>,

    /// MQTT broker address, overriding the configuration file.
    #[arg(long)]
    broker: Option<String>,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let channel = args.channel as usize;

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(broker) = args.broker {
        settings.broker.host = broker;
    }
    if args.prefix.is_some() {
        settings.device.prefix = args.prefix;
    }

    let transport: Arc<dyn Transport> = Arc::new(MqttTransport::connect(
        &settings.broker.host,
        settings.broker.port,
        &settings.broker.client_id,
    ));

    let prefix = match settings.device.prefix.clone() {
        Some(prefix) => prefix,
        None => {
            info!("discovering devices on '{}'", settings.device.discovery_filter);
            let found = discovery::discover(
                transport.as_ref(),
                &settings.device.discovery_filter,
                settings.discovery_window(),
            )
            .await?;
            discovery::ensure_single(found, &settings.device.discovery_filter)?
        }
    };

    let booster = Booster::connect(transport.clone(), &prefix, settings.command_timeout())
        .await
        .with_context(|| format!("failed to connect to '{prefix}'"))?;

    if let Some(state) = args.state {
        booster.set_channel_state(channel, state).await?;
        println!("Channel {channel} state set to {}", state.name());
    }

    if let Some(target) = args.bias {
        let reading = booster
            .tune_bias_with_limits(channel, target, settings.tuner_limits())
            .await
            .with_context(|| format!("bias tuning failed on channel {channel}"))?;
        println!(
            "Channel {channel}: Vgs = {:.3} V, Ids = {:.2} mA",
            reading.vgs,
            reading.ids * 1000.0
        );
    }

    if args.telemetry {
        let reader = TelemetryReader::subscribe(
            transport.as_ref(),
            &prefix,
            Channel::from_index(channel)?,
        )
        .await?;
        let packet = reader.take_next().await?;
        println!("{}", serde_json::to_string_pretty(&packet)?);
    }

    if args.save {
        booster.save_channel(channel).await?;
        println!("Channel {channel} configuration saved");
    }

    Ok(())
}
