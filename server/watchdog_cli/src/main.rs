use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::signal;
use tokio::sync::broadcast;
use watchdog_cli::alarm::beep::Beep;
use watchdog_cli::camera::{FramePipeline, frame_worker};
use watchdog_cli::cli::Args;
use watchdog_cli::config::Config;
use watchdog_cli::device::Device;
use watchdog_cli::networking::broker_link;
use watchdog_cli::operator::CommandHandler;
use watchdog_cli::AppEvent;
use watchdog_vision::AudioSource;
use watchdog_vision::audio::{PcmFileSource, SyntheticMicrophone};
use watchdog_vision::synthetic::SyntheticCamera;
use watchdog_vision::tcp_sink::TcpMediaSink;
use watchdog_vision::{StreamPusher, frame_channel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let config = Config::load(&args.config).with_context(|| format!("invalid config: {}", args.config.display()))?;

    if args.dump_config {
        println!("{}", config.to_pretty_ron()?);
        return Ok(());
    }

    // Create event channel
    let (app_event_tx, app_event_rx) = broadcast::channel::<AppEvent>(16);
    drop(app_event_rx);

    let (frame_tx, frame_rx) = frame_channel(config.frame_queue_depth);
    let generation = frame_tx.generation();
    let camera = SyntheticCamera::new(frame_tx, config.motion, args.synthetic_motion_period);
    let microphone: Box<dyn AudioSource> = match &config.stream.audio_input {
        Some(path) => Box::new(PcmFileSource::new(path)),
        None => Box::new(SyntheticMicrophone::default()),
    };
    let pusher = Arc::new(
        StreamPusher::new(Box::new(TcpMediaSink::new(config.stream.jpeg_quality))).with_audio(microphone),
    );
    let siren = Beep::new(&config.alarm).context("unable to start alarm tone")?;

    let device = Arc::new(Device::new(
        &config,
        Box::new(camera),
        generation,
        pusher,
        Box::new(siren),
    ));

    let frame_worker_handle = tokio::spawn(frame_worker(
        FramePipeline::new(device.clone()),
        frame_rx,
        app_event_tx.subscribe(),
    ));

    let broker_link_handle = tokio::spawn(broker_link(
        config.broker.clone(),
        CommandHandler::new(device.clone(), config.settle_delay()),
        app_event_tx.subscribe(),
    ));

    info!(
        "Watchdog running. camera: {}, broker: {}, queue: {}",
        config.camera.camera_id, config.broker.host, config.broker.queue
    );

    // Wait for Ctrl+C
    let _ = signal::ctrl_c().await;

    info!("Shut down requested, exiting");

    // stop the detector first, then the command channel, then streaming and the alarm
    tokio::task::spawn_blocking({
        let device = device.clone();
        move || device.close_camera()
    })
    .await?;
    let _ = app_event_tx.send(AppEvent::Shutdown);

    let _ = frame_worker_handle.await;
    let _ = broker_link_handle.await;

    tokio::task::spawn_blocking({
        let device = device.clone();
        move || device.shutdown()
    })
    .await?;

    info!("Shutdown complete");
    Ok(())
}
