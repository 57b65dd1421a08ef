//! Drive a simulated arm sweeping its heading and print the poses and
//! button events the driver publishes.
//!
//! Usage: cargo run --example replay
//! Set RUST_LOG=debug to see driver diagnostics.

use faroarm::{Buttons, DriverConfig, FaroArmDriver, Outputs, RawFrame, ReplayBackend, UpdateStatus};
use std::time::Duration;

fn main() {
    env_logger::init();

    let config = DriverConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let mut frames = Vec::new();
    for i in 0..200u64 {
        let heading = (i as f64 * 1.8) % 360.0;
        let mut frame = RawFrame::data([250.0 + i as f64, 100.0, -40.0], [heading, 10.0, 0.0], i * 20);
        if (50..60).contains(&i) {
            frame = frame.with_buttons(Buttons::FRONT);
        }
        if i % 100 == 99 {
            frame = RawFrame::status(UpdateStatus::Timeout);
        }
        frames.push(frame);
    }
    // Arm resting: identical samples are suppressed.
    frames.push(frames[198]);

    let (pose_tx, pose_rx) = crossbeam_channel::bounded(1024);
    let (front_tx, front_rx) = crossbeam_channel::bounded(64);
    let outputs = Outputs::new().with_pose(pose_tx).with_front_button(front_tx);

    let backend = ReplayBackend::new(frames).with_idle(config.sample_period());
    let mut driver = FaroArmDriver::new(backend, config, outputs);
    if let Err(e) = driver.start() {
        eprintln!("Failed to start driver: {}", e);
        std::process::exit(1);
    }
    println!("Replaying at an assumed {} Hz", driver.config().frequency);
    // Upstream tracker processing delay.
    driver.latency_handle().set_latency(19.0);

    let mut count: u64 = 0;
    while let Ok(m) = pose_rx.recv_timeout(Duration::from_millis(500)) {
        count += 1;
        if count % 20 == 1 {
            let p = &m.value;
            println!(
                "ts={:<20} pos=[{:+.4}, {:+.4}, {:+.4}]  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]",
                m.timestamp,
                p.position[0], p.position[1], p.position[2],
                p.orientation.x, p.orientation.y, p.orientation.z, p.orientation.w,
            );
        }
    }
    driver.stop();

    let presses: Vec<_> = front_rx.try_iter().map(|m| m.timestamp).collect();
    println!("\n{} poses, {} front button press(es) at {:?}", count, presses.len(), presses);
}
