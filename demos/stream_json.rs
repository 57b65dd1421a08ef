//! Stream simulated arm poses as JSON lines.
//!
//! {"x":0.250,"y":0.100,"z":-0.040,"qx":0.0,"qy":0.0,"qz":0.0,"qw":1.0,"t":1700000000000000000}
//!
//! Usage: cargo run --release --example stream_json

use faroarm::{DriverConfig, FaroArmDriver, FaroArmError, Outputs, RawFrame, ReplayBackend};
use std::io::{self, Write};
use std::time::Duration;

fn main() {
    env_logger::init();

    let config = DriverConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let frames = (0..500u64).map(|i| {
        let t = i as f64 / config.frequency;
        RawFrame::data(
            [250.0 * t.cos(), 250.0 * t.sin(), 100.0],
            [t.to_degrees(), 0.0, 0.0],
            i * (1000.0 / config.frequency) as u64,
        )
    });
    let backend = ReplayBackend::new(frames.collect::<Vec<_>>()).with_idle(config.sample_period());

    let (pose_tx, pose_rx) = crossbeam_channel::bounded(256);
    let mut driver = FaroArmDriver::new(backend, config, Outputs::new().with_pose(pose_tx));
    if let Err(e) = driver.start() {
        eprintln!("Failed to start driver: {}", e);
        std::process::exit(1);
    }

    eprintln!("Streaming JSON (Ctrl+C to stop)...");

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    loop {
        let result = pose_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| FaroArmError::Timeout);
        match result {
            Ok(m) => {
                let p = &m.value;
                let _ = writeln!(
                    out,
                    "{{\"x\":{:.4},\"y\":{:.4},\"z\":{:.4},\"qx\":{:.5},\"qy\":{:.5},\"qz\":{:.5},\"qw\":{:.5},\"t\":{}}}",
                    p.position[0],
                    p.position[1],
                    p.position[2],
                    p.orientation.x,
                    p.orientation.y,
                    p.orientation.z,
                    p.orientation.w,
                    m.timestamp,
                );
                let _ = out.flush();
            }
            Err(e) => {
                eprintln!("{}, stopping", e);
                break;
            }
        }
    }
    driver.stop();
}
