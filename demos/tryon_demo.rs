//! Try-on engine demo: a scripted tracker thread feeds landmark sets into
//! a running session while a recording surface captures the draw calls.
//!
//! Run with: cargo run --example tryon_demo

use std::thread;
use std::time::Duration;

use tryon_engine::driver::FixedSizeVideo;
use tryon_engine::landmarks::ChannelLandmarkSource;
use tryon_engine::{
    Category, EngineConfig, FixedRateScheduler, Landmark, LandmarkRole, LandmarkSet, OverlayAsset,
    RecordingSurface, Session,
};

const CANVAS_WIDTH: u32 = 640;
const CANVAS_HEIGHT: u32 = 480;
const TARGET_FPS: u32 = 30;
const DEMO_FRAMES: u32 = 90;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::default();
    let (sender, tracker) = ChannelLandmarkSource::new(config.reuse_window());

    // Scripted tracker: eyes drifting slowly across the frame, with a few
    // dropped detections to exercise the reuse window.
    let tracker_thread = thread::spawn(move || {
        for frame in 0..DEMO_FRAMES {
            if frame % 20 == 19 {
                // Simulate a missed detection.
                thread::sleep(Duration::from_millis(33));
                continue;
            }
            let drift = frame as f32 * 1.5;
            let mut set = LandmarkSet::new();
            set.insert(
                LandmarkRole::LeftEye,
                Landmark::new(240.0 + drift, 180.0, 0.92),
            );
            set.insert(
                LandmarkRole::RightEye,
                Landmark::new(320.0 + drift, 184.0, 0.95),
            );
            sender.send(set);
            thread::sleep(Duration::from_millis(33));
        }
    });

    // A 2x1 magenta sprite stands in for real glasses art.
    let sprite = OverlayAsset::sprite_from_rgba(vec![255, 0, 255, 255, 255, 0, 255, 255], 2, 1)?;

    let mut session = Session::start(
        &FixedSizeVideo::new(CANVAS_WIDTH, CANVAS_HEIGHT),
        RecordingSurface::new(),
        tracker,
        Category::Glasses,
        sprite,
        config,
    )?;

    session.on_transform(|t| {
        log::debug!(
            "anchor at ({:.1}, {:.1}) rot {:.3} size {:.1}",
            t.mirrored_x,
            t.mirrored_y,
            t.rotation_radians,
            t.size
        );
    });

    let handle = session.handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(
            (DEMO_FRAMES as u64 * 1000) / TARGET_FPS as u64,
        ));
        handle.stop();
    });

    let mut scheduler = FixedRateScheduler::new(TARGET_FPS);
    session.run(&mut scheduler);

    stopper.join().ok();
    tracker_thread.join().ok();

    log::info!(
        "demo finished: {} frames drawn, {} skipped, {} draw calls recorded",
        session.frames_drawn(),
        session.frames_skipped(),
        session.surface().draw_count()
    );
    if let Some(last) = session.handle().last_transform() {
        log::info!(
            "last anchor: ({:.1}, {:.1}) rotation {:.3} rad, size {:.1}",
            last.mirrored_x,
            last.mirrored_y,
            last.rotation_radians,
            last.size
        );
    }

    Ok(())
}
