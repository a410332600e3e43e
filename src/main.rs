// src/main.rs
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use hand_conductor::source::{LandmarkSource, SimulatedSource};
use hand_conductor::{Pipeline, PipelineConfig};

const DETECTOR_INTERVAL: Duration = Duration::from_millis(33);
const RENDER_INTERVAL: Duration = Duration::from_millis(16);
// Heartbeat roughly once a second at the render cadence.
const HEARTBEAT_TICKS: u64 = 60;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(&path)?,
        None => {
            warn!("no config path given, using defaults");
            PipelineConfig::default()
        }
    };
    info!(
        cooldown_ms = config.cooldown_ms,
        depth_min = config.depth_min,
        depth_max = config.depth_max,
        "starting control pipeline"
    );

    let mut pipeline = Pipeline::new(config)?;
    // No detector wired up in the demo binary: drive the pipeline from the
    // simulated source so the whole control path is exercised end to end.
    let mut source = SimulatedSource::new(30.0);

    let mut detector = tokio::time::interval(DETECTOR_INTERVAL);
    let mut render = tokio::time::interval(RENDER_INTERVAL);
    let mut last_tick = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = detector.tick() => {
                if let Some(frame) = source.poll_frame() {
                    pipeline.ingest_frame(&frame, Instant::now());
                }
            }
            _ = render.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick);
                last_tick = now;
                pipeline.tick(dt);

                // A real renderer would consume these each tick.
                let params = pipeline.render_params();
                ticks += 1;
                if ticks % HEARTBEAT_TICKS == 0 {
                    info!(
                        gesture = pipeline.gesture_label(),
                        particle_count = params.particle_count,
                        shape = ?params.shape,
                        yaw = params.yaw,
                        pitch = params.pitch,
                        depth = params.depth,
                        hands = params.hands.len(),
                        "scene"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
