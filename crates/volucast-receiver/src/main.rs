use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use volucast_net::{FrameQueue, UdpTransport};
use volucast_protocol::receiver::{
    ConnectReceiverPacket, HeartbeatReceiverPacket, ReportReceiverPacket,
    RequestReceiverPacket,
};
use volucast_protocol::types::{ReceiverId, SessionId};
use volucast_receiver::audio::AudioReceiver;
use volucast_receiver::classifier::classify_sender_packets;
use volucast_receiver::color::RawColorDecoder;
use volucast_receiver::config::ReceiverConfig;
use volucast_receiver::decode::{DecodeItem, DecodedFrame, DeliveryStats, VideoDecodePipeline};
use volucast_receiver::recover::VideoMessageAssembler;
use volucast_receiver::{ABANDON_TIMEOUT, CONNECT_RETRY, HEARTBEAT_PERIOD, REQUEST_HOLDOFF};

#[derive(Parser)]
#[command(
    name = "volucast-receiver",
    about = "Receives and decodes a volucast RGB-D stream"
)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Sender address (host:port), overrides config
    #[arg(long)]
    sender: Option<String>,

    /// Depth width, overrides config
    #[arg(long)]
    width: Option<usize>,

    /// Depth height, overrides config
    #[arg(long)]
    height: Option<usize>,

    /// Skip the audio stream
    #[arg(long)]
    no_audio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volucast_receiver=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {}", config_path))?;
        toml::from_str(&content)?
    } else {
        ReceiverConfig::default()
    };
    if let Some(sender) = args.sender {
        config.sender = sender;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if args.no_audio {
        config.audio = false;
    }

    let receiver_id: ReceiverId = volucast_net::random_id();
    let sender_addr: SocketAddr = config
        .sender
        .parse()
        .with_context(|| format!("invalid sender address {}", config.sender))?;
    let bind_addr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let transport = UdpTransport::bind(bind_addr, config.socket_buffer_size)
        .with_context(|| format!("failed to bind UDP on {bind_addr}"))?;
    info!(
        receiver_id,
        local = %transport.local_addr()?,
        sender = %sender_addr,
        "receiver up"
    );

    let (packet_tx, mut packet_rx) = mpsc::channel(64);
    let (stats_tx, mut stats_rx) = mpsc::channel::<DeliveryStats>(64);
    let (frames_tx, mut frames_rx) = mpsc::channel::<DecodedFrame>(16);
    let (pcm_tx, mut pcm_rx) = mpsc::channel::<Vec<f32>>(64);
    let decode_queue = Arc::new(FrameQueue::<DecodeItem>::new(8));

    // Net receive task.
    {
        let transport = transport.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(1));
            loop {
                tick.tick().await;
                let datagrams = transport.drain(512);
                if datagrams.is_empty() {
                    continue;
                }
                let set = classify_sender_packets(&datagrams);
                if !set.received_any() {
                    continue;
                }
                if packet_tx.send(set).await.is_err() {
                    break;
                }
            }
        });
    }

    // Decode task.
    {
        let decode_queue = decode_queue.clone();
        let width = config.width;
        let height = config.height;
        let audio_enabled = config.audio;
        tokio::spawn(async move {
            let mut video =
                VideoDecodePipeline::new(width, height, Box::new(RawColorDecoder));
            let mut audio = match AudioReceiver::new() {
                Ok(audio) => audio,
                Err(e) => {
                    error!("audio decoder unavailable: {e:#}");
                    return;
                }
            };
            let mut last_delivery: Option<Instant> = None;

            loop {
                match decode_queue.pop().await {
                    DecodeItem::Reset => {
                        video.reset();
                        if let Err(e) = audio.reset() {
                            error!("audio decoder reset failed: {e:#}");
                        }
                        last_delivery = None;
                    }
                    DecodeItem::Video(message) => {
                        let start = Instant::now();
                        match video.decode(&message) {
                            Ok(frame) => {
                                let decoder_time_ms =
                                    start.elapsed().as_secs_f32() * 1000.0;
                                let frame_time_ms = last_delivery
                                    .map(|t| start.duration_since(t).as_secs_f32() * 1000.0)
                                    .unwrap_or(0.0);
                                last_delivery = Some(start);

                                let stats = DeliveryStats {
                                    frame_id: frame.frame_id,
                                    decoder_time_ms,
                                    frame_time_ms,
                                };
                                if stats_tx.send(stats).await.is_err() {
                                    break;
                                }
                                if frames_tx.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                // Corrupt depth state; a keyframe rebuilds it.
                                error!(frame_id = message.frame_id, "decode failed: {e:#}");
                                video.reset();
                            }
                        }
                    }
                    DecodeItem::Audio(packet) => {
                        if !audio_enabled {
                            continue;
                        }
                        match audio.handle(&packet) {
                            Ok(frames) => {
                                for pcm in frames {
                                    if pcm_tx.send(pcm).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(e) => warn!("audio decode failed: {e:#}"),
                        }
                    }
                }
            }
        });
    }

    // Consumers standing in for the renderer and the speakers.
    tokio::spawn(async move {
        let mut delivered = 0u64;
        let mut last_log = Instant::now();
        while let Some(frame) = frames_rx.recv().await {
            delivered += 1;
            if last_log.elapsed() >= Duration::from_secs(2) {
                last_log = Instant::now();
                info!(
                    delivered,
                    frame_id = frame.frame_id,
                    keyframe = frame.keyframe,
                    depth_pixels = frame.depth.len(),
                    color_bytes = frame.color.len(),
                    "frames delivered"
                );
            }
        }
    });
    tokio::spawn(async move { while pcm_rx.recv().await.is_some() {} });

    // Recover/deliver loop: owns the assembler and all feedback traffic.
    let connect = ConnectReceiverPacket {
        receiver_id,
        wants_video: config.video,
        wants_audio: config.audio,
    };
    let mut assembler = VideoMessageAssembler::new(ABANDON_TIMEOUT, REQUEST_HOLDOFF);
    let mut current_session: Option<SessionId> = None;
    let mut last_connect: Option<Instant> = None;
    let mut last_heartbeat = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_millis(1));

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
        let now = Instant::now();
        let mut connect_wanted = false;

        while let Ok(set) = packet_rx.try_recv() {
            // A different session id means the sender restarted: drop all
            // stream state and start over from that session's packets.
            let seen_session = set
                .heartbeats
                .first()
                .copied()
                .or_else(|| set.video_packets.first().map(|p| p.session_id))
                .or_else(|| set.parity_packets.first().map(|p| p.session_id))
                .or_else(|| set.audio_packets.first().map(|p| p.session_id));
            if let Some(session_id) = seen_session {
                match current_session {
                    None => {
                        info!(session_id, "joined session");
                        current_session = Some(session_id);
                    }
                    Some(current) if current != session_id => {
                        warn!(
                            old = current,
                            new = session_id,
                            "session changed, resetting stream state"
                        );
                        assembler.reset();
                        decode_queue.clear();
                        decode_queue.push(true, DecodeItem::Reset);
                        current_session = Some(session_id);
                        connect_wanted = true;
                    }
                    Some(_) => {}
                }
            }
            let Some(session) = current_session else {
                continue;
            };

            for packet in set.video_packets {
                if packet.session_id == session {
                    assembler.add_video(packet, now);
                }
            }
            for packet in set.parity_packets {
                if packet.session_id == session {
                    assembler.add_parity(packet, now);
                }
            }
            for packet in set.audio_packets {
                if packet.session_id == session && config.audio {
                    decode_queue.push(false, DecodeItem::Audio(packet));
                }
            }
        }

        while let Ok(stats) = stats_rx.try_recv() {
            let report = ReportReceiverPacket {
                receiver_id,
                frame_id: stats.frame_id,
                decoder_time_ms: stats.decoder_time_ms,
                frame_time_ms: stats.frame_time_ms,
            };
            transport.send_to(&report.to_bytes(), sender_addr).await;
        }

        let output = assembler.tick(now);
        for message in output.delivered {
            decode_queue.push(message.keyframe, DecodeItem::Video(message));
        }
        for (frame_id, packet_indices) in output.requests {
            let request = RequestReceiverPacket {
                receiver_id,
                frame_id,
                packet_indices,
            };
            transport.send_to(&request.to_bytes(), sender_addr).await;
        }
        // A lost frame is recovered by reconnecting, which makes the
        // sender promote its next frame to a keyframe.
        connect_wanted |= output.keyframe_wanted;

        let connect_due = match last_connect {
            Some(at) => now.duration_since(at) >= CONNECT_RETRY,
            None => true,
        };
        if (current_session.is_none() || connect_wanted) && connect_due {
            last_connect = Some(now);
            transport.send_to(&connect.to_bytes(), sender_addr).await;
        }

        if now.duration_since(last_heartbeat) >= HEARTBEAT_PERIOD {
            last_heartbeat = now;
            let heartbeat = HeartbeatReceiverPacket { receiver_id };
            transport.send_to(&heartbeat.to_bytes(), sender_addr).await;
        }
    }

    Ok(())
}
