use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use volucast_net::{FrameQueue, SessionClock, UdpTransport};
use volucast_protocol::sender::HeartbeatSenderPacket;
use volucast_sender::audio::AudioPacketSender;
use volucast_sender::capture::{CaptureSource, PlaybackSource, SyntheticSource};
use volucast_sender::classifier::{classify_receiver_packets, FeedbackCollection};
use volucast_sender::color::RawColorEncoder;
use volucast_sender::config::SenderConfig;
use volucast_sender::encode::{packetize, VideoEncodePipeline, VideoFrameSet};
use volucast_sender::video::VideoPacketSender;
use volucast_sender::{HEARTBEAT_PERIOD, RECEIVER_TIMEOUT, RETENTION_TIMEOUT};

#[derive(Parser)]
#[command(
    name = "volucast-sender",
    about = "Streams RGB-D frames to connected receivers"
)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// UDP port, overrides config
    #[arg(long)]
    port: Option<u16>,

    /// Bind address (IP), overrides config
    #[arg(long)]
    host: Option<String>,

    /// Recorded clip to stream instead of the synthetic scene
    #[arg(long)]
    playback: Option<std::path::PathBuf>,

    /// Replay the clip from the start when it ends
    #[arg(long)]
    loop_playback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volucast_sender=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {}", config_path))?;
        toml::from_str(&content)?
    } else {
        SenderConfig::default()
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(playback) = args.playback {
        config.playback = Some(playback);
    }
    if args.loop_playback {
        config.loop_playback = true;
    }

    let session_id = volucast_net::random_id();
    let clock = SessionClock::start();

    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let transport = UdpTransport::bind(addr, config.socket_buffer_size)
        .with_context(|| format!("failed to bind UDP on {addr}"))?;
    info!(session_id, addr = %transport.local_addr()?, "sender up");

    let mut source = match &config.playback {
        Some(path) => {
            info!(clip = %path.display(), "streaming recorded clip");
            CaptureSource::Playback(PlaybackSource::open(path, config.loop_playback)?)
        }
        None => {
            info!(
                width = config.width,
                height = config.height,
                "streaming synthetic scene"
            );
            CaptureSource::Synthetic(SyntheticSource::new(config.width, config.height))
        }
    };
    let calibration = source.calibration();

    let frame_queue = Arc::new(FrameQueue::<VideoFrameSet>::new(8));
    let (feedback_tx, mut feedback_rx) = mpsc::channel::<FeedbackCollection>(64);
    let keyframe_request = Arc::new(AtomicBool::new(false));

    // Until a real microphone feeds the ring, a test tone does.
    let (pcm_producer, pcm_consumer) = volucast_audio::pcm_ring(16);
    tokio::spawn(produce_test_tone(pcm_producer));

    // Capture + encode task.
    {
        let frame_queue = frame_queue.clone();
        let keyframe_request = keyframe_request.clone();
        let keyframe_interval = config.keyframe_interval;
        let frame_period =
            Duration::from_secs_f64(1.0 / config.frames_per_second.max(1) as f64);
        tokio::spawn(async move {
            let mut pipeline = VideoEncodePipeline::new(
                &calibration,
                Box::new(RawColorEncoder),
                keyframe_interval,
                clock,
            );
            let mut tick = tokio::time::interval(frame_period);
            loop {
                tick.tick().await;
                if keyframe_request.swap(false, Ordering::Relaxed) {
                    pipeline.request_keyframe();
                }

                let mut frame = match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        info!("capture source exhausted");
                        break;
                    }
                    Err(e) => {
                        error!("capture failed: {e:#}");
                        break;
                    }
                };

                let message = match pipeline.encode(&mut frame) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("encode failed, forcing keyframe: {e:#}");
                        pipeline.request_keyframe();
                        continue;
                    }
                };
                match packetize(session_id, &message) {
                    Ok(set) => {
                        frame_queue.push(set.keyframe, set);
                    }
                    Err(e) => warn!(frame_id = message.frame_id, "packetize failed: {e}"),
                }
            }
        });
    }

    // Feedback receive task.
    {
        let transport = transport.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(1));
            loop {
                tick.tick().await;
                let datagrams = transport.drain(256);
                if datagrams.is_empty() {
                    continue;
                }
                let feedback = classify_receiver_packets(&datagrams);
                if feedback.is_empty() {
                    continue;
                }
                if feedback_tx.send(feedback).await.is_err() {
                    break;
                }
            }
        });
    }

    // Net send loop: owns receiver state and the retransmission store.
    let mut sender = VideoPacketSender::new(session_id);
    let mut audio = AudioPacketSender::new(session_id, pcm_consumer)?;
    let mut tick = tokio::time::interval(Duration::from_millis(1));
    let mut last_heartbeat = Instant::now();
    let mut last_maintenance = Instant::now();
    let mut last_summary = Instant::now();

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
        let now = Instant::now();

        while let Ok(feedback) = feedback_rx.try_recv() {
            for (endpoint, bytes) in sender.apply_feedback(feedback, now) {
                transport.send_to(&bytes, endpoint).await;
            }
        }
        if sender.take_keyframe_needed() {
            keyframe_request.store(true, Ordering::Relaxed);
        }

        while let Some(set) = frame_queue.try_pop() {
            let endpoints = sender.video_endpoints();
            // Video before parity, within each frame.
            for packet in &set.video_packets {
                let bytes = packet.to_bytes();
                for endpoint in &endpoints {
                    transport.send_to(&bytes, *endpoint).await;
                }
            }
            for packet in &set.parity_packets {
                let bytes = packet.to_bytes();
                for endpoint in &endpoints {
                    transport.send_to(&bytes, *endpoint).await;
                }
            }
            sender.record_sent(set, now);
        }

        if let Err(e) = audio.pump(&transport, &sender.audio_endpoints()).await {
            warn!("audio encode failed: {e:#}");
        }

        if now.duration_since(last_heartbeat) >= HEARTBEAT_PERIOD {
            last_heartbeat = now;
            let bytes = HeartbeatSenderPacket { session_id }.to_bytes();
            for endpoint in sender.all_endpoints() {
                transport.send_to(&bytes, endpoint).await;
            }
        }

        if now.duration_since(last_maintenance) >= Duration::from_millis(250) {
            last_maintenance = now;
            sender.prune_receivers(RECEIVER_TIMEOUT, now);
            sender.cleanup_storage(RETENTION_TIMEOUT, now);
        }

        if now.duration_since(last_summary) >= Duration::from_secs(10) {
            last_summary = now;
            let summary = sender.summary();
            if summary.received_report_count > 0 {
                let count = summary.received_report_count as f32;
                info!(
                    reports = summary.received_report_count,
                    receivers = sender.receiver_count(),
                    stored_frames = sender.storage_len(),
                    avg_decode_ms = summary.decoder_time_ms_sum / count,
                    avg_frame_ms = summary.frame_interval_ms_sum / count,
                    avg_rtt_ms = summary.round_trip_ms_sum / count,
                    "receiver summary"
                );
            }
        }
    }

    Ok(())
}

/// Fills the audio ring with a 440 Hz tone at real-time pace.
async fn produce_test_tone(mut producer: volucast_audio::PcmProducer) {
    use ringbuf::traits::Producer;

    let mut sample_index = 0u64;
    let mut tick = tokio::time::interval(Duration::from_millis(20));
    loop {
        tick.tick().await;
        let samples: Vec<f32> = (0..volucast_audio::SAMPLES_PER_FRAME)
            .map(|i| {
                let t = (sample_index + i as u64) as f32
                    / volucast_audio::SAMPLE_RATE as f32;
                (t * 440.0 * std::f32::consts::TAU).sin() * 0.2
            })
            .collect();
        sample_index += volucast_audio::SAMPLES_PER_FRAME as u64;
        producer.push_slice(&samples);
    }
}
