pub const FOREGROUND_SEED: f32 = 0.0;
pub const BACKGROUND_SEED: f32 = 100.0;

pub const FOREGROUND_STEP: usize = 5;
pub const BACKGROUND_STEP: usize = 10;

const BASE: f32 = 0.9;
const RISE: f32 = 0.7;

// (amplitude, frequency) of the additive noise terms.
const OCTAVES: [(f32, f32); 3] = [(0.05, 10.0), (0.02, 23.0), (0.01, 50.0)];

pub fn height(x_norm: f32, seed_offset: f32) -> f32 {
    let slope = BASE - x_norm * RISE;
    let noise: f32 = OCTAVES
        .iter()
        .map(|&(amplitude, frequency)| (x_norm * frequency + seed_offset).sin() * amplitude)
        .sum();
    slope + noise
}

pub fn ground_y(x_norm: f32, frame_height: f32) -> f32 {
    height(x_norm, FOREGROUND_SEED) * frame_height
}

// `shift` is added to the normalized x before sampling, which is how the
// background range scrolls with progress.
pub fn skyline(
    width: usize,
    frame_height: f32,
    step: usize,
    seed_offset: f32,
    shift: f32,
) -> Vec<(f32, f32)> {
    if width == 0 {
        return Vec::new();
    }
    let step = step.max(1);
    let mut points: Vec<(f32, f32)> = (0..=width)
        .step_by(step)
        .map(|px| {
            let x_norm = px as f32 / width as f32;
            (px as f32, height(x_norm + shift, seed_offset) * frame_height)
        })
        .collect();
    if points.last().map(|&(x, _)| x < width as f32).unwrap_or(true) {
        let x_norm = 1.0;
        points.push((width as f32, height(x_norm + shift, seed_offset) * frame_height));
    }
    points
}
