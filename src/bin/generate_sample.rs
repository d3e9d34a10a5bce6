use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

use apd_loader::{POSE2D_JOINTS, POSE3D_JOINTS};

const MOTION_PRIMITIVES: [&str; 6] = ["wait", "start", "move", "stop", "left", "right"];

/// Normal sample via the Box-Muller transform.
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Head track as a noisy constant-velocity walk in metres, 3 coordinates per step.
fn head_track(rng: &mut StdRng, steps: usize, speed: f64) -> Vec<[f64; 3]> {
    let heading = rng.gen::<f64>() * std::f64::consts::TAU;
    let (mut x, mut y) = (gauss(rng, 0.0, 5.0), gauss(rng, 0.0, 5.0));
    let height = gauss(rng, 1.7, 0.08);
    (0..steps)
        .map(|_| {
            x += speed * heading.cos() * 0.04 + gauss(rng, 0.0, 0.005);
            y += speed * heading.sin() * 0.04 + gauss(rng, 0.0, 0.005);
            [x, y, height]
        })
        .collect()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn sample_record(rng: &mut StdRng, id: usize) -> Value {
    let vru_type = if rng.gen::<f64>() < 0.7 { "ped" } else { "bike" };
    let set = match rng.gen_range(0..10) {
        0..=6 => "train",
        7 => "valid",
        _ => "test",
    };
    let steps = 20 + rng.gen_range(0..60);
    let speed = if vru_type == "ped" { 1.4 } else { 4.5 };

    let start: u64 = 1_500_000_000_000 + id as u64 * 100_000;
    let timestamps: Vec<u64> = (0..steps as u64).map(|i| start + i * 40).collect();
    let head = head_track(rng, steps, speed);

    let mut pose3d = Map::new();
    for joint in POSE3D_JOINTS {
        let below_head = gauss(rng, 0.6, 0.4).abs();
        let series: Vec<Value> = head
            .iter()
            .map(|&[x, y, z]| json!([round3(x + gauss(rng, 0.0, 0.1)), round3(y + gauss(rng, 0.0, 0.1)), round3(z - below_head)]))
            .collect();
        pose3d.insert(joint.to_string(), Value::Array(series));
    }

    let mut pose2d = Map::new();
    for joint in POSE2D_JOINTS {
        let (u, v) = (gauss(rng, 960.0, 200.0), gauss(rng, 540.0, 100.0));
        let series: Vec<Value> = (0..steps)
            .map(|_| json!([round3(u + gauss(rng, 0.0, 2.0)), round3(v + gauss(rng, 0.0, 2.0))]))
            .collect();
        pose2d.insert(joint.to_string(), Value::Array(series));
    }

    let active = rng.gen_range(0..MOTION_PRIMITIVES.len());
    let mut motion_primitives = Map::new();
    for (i, primitive) in MOTION_PRIMITIVES.iter().enumerate() {
        let flag = u8::from(i == active);
        motion_primitives.insert(primitive.to_string(), json!(vec![flag; steps]));
    }

    json!({
        "vru_type": vru_type,
        "set": set,
        "timestamps": timestamps,
        "head_smoothed": head.iter().map(|p| p.map(round3)).collect::<Vec<_>>(),
        "pose3d": pose3d,
        "pose2d": pose2d,
        "motion_primitives": motion_primitives,
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(42);
    let output_dir = Path::new("sample_data");
    fs::create_dir_all(output_dir).context("creating output directory")?;

    let count = 60;
    for id in 0..count {
        let record = sample_record(&mut rng, id);
        let path = output_dir.join(format!("{id:05}.json"));
        let file = fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(file, &record).with_context(|| format!("writing {}", path.display()))?;
    }

    info!("Wrote {count} records to {}", output_dir.display());
    println!("Wrote {count} records to {}", output_dir.display());
    Ok(())
}
