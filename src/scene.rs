use crate::canvas::Canvas;
use crate::color::Rgb;
use crate::config::PaletteConfig;
use crate::particles::Particle;
use crate::terrain::{self, BACKGROUND_SEED, BACKGROUND_STEP, FOREGROUND_SEED, FOREGROUND_STEP};
use crate::visual::VisualFrameState;

// Frame height at which decorative sizes are drawn 1:1.
const REFERENCE_HEIGHT: f32 = 400.0;
const MIN_SCALE: f32 = 0.25;

const SUN_GLOW_RADIUS: f32 = 120.0;
const SUN_CORE_RADIUS: f32 = 30.0;
const SUN_GLOW_ALPHA: f32 = 0.533;
const STAR_COUNT: u32 = 40;
const STAR_DRIFT: f32 = 10.0;
const BACKGROUND_LIFT: f32 = 0.1;
const BACKGROUND_PARALLAX: f32 = 0.2;
const CLIMBER_SIZE: f32 = 4.0;
const AURA_BOOST: f32 = 30.0;
const FLAG_POLE: f32 = 20.0;
const FLAG_INSET: f32 = 5.0;
const FLAG_SIZE: f32 = 3.0;
const FLAG_GLOW: f32 = 10.0;

fn scaled(px: f32, scale: f32, min: f32) -> f32 {
    (px * scale).max(min)
}

// Cheap deterministic hash of (star, time slot) into [0, 1].
fn flicker(star: u32, slot: u32) -> f32 {
    let mut x = star.wrapping_mul(0x9E37_79B1) ^ slot.wrapping_mul(0x85EB_CA77);
    x ^= x >> 15;
    x = x.wrapping_mul(0x2C1B_3C6D);
    x ^= x >> 12;
    (x & 0xFFFF) as f32 / 65535.0
}

pub fn render(
    canvas: &mut Canvas,
    frame: &VisualFrameState,
    particles: &[Particle],
    palette: &PaletteConfig,
) {
    let w = canvas.width() as f32;
    let h = canvas.height() as f32;
    if canvas.width() == 0 || canvas.height() == 0 {
        return;
    }
    let scale = (h / REFERENCE_HEIGHT).clamp(MIN_SCALE, 1.0);
    let day = frame.sunrise_mix;

    canvas.set_offset(0.0, 0.0);
    canvas.fill_vertical_gradient(frame.palette.sky_top, frame.palette.sky_bottom);
    canvas.set_offset(frame.shake.0, frame.shake.1);

    if day > 0.01 {
        let sun_x = w * 0.8;
        let sun_y = h * 0.4 - day * h * 0.2;
        canvas.fill_radial(
            sun_x,
            sun_y,
            scaled(SUN_GLOW_RADIUS, scale, 4.0),
            palette.sun_glow,
            SUN_GLOW_ALPHA * day,
            0.0,
        );
        canvas.fill_circle(sun_x, sun_y, scaled(SUN_CORE_RADIUS, scale, 1.5), palette.sun, day);
    }

    if day < 1.0 {
        draw_stars(canvas, frame, palette.star);
    }

    let background: Vec<(f32, f32)> = terrain::skyline(
        canvas.width(),
        h,
        BACKGROUND_STEP,
        BACKGROUND_SEED,
        frame.progress * BACKGROUND_PARALLAX,
    )
    .into_iter()
    .map(|(x, y)| (x, y + BACKGROUND_LIFT * h))
    .collect();
    canvas.fill_below(&background, frame.palette.mountain_background);

    let path = terrain::skyline(canvas.width(), h, FOREGROUND_STEP, FOREGROUND_SEED, 0.0);
    canvas.fill_below(&path, frame.palette.mountain_foreground);

    for p in particles {
        canvas.fill_circle(p.x, p.y, p.size, palette.particle, p.life());
    }

    draw_climber(canvas, frame, palette.climber, scale);

    if frame.show_summit {
        draw_summit(canvas, day, palette.summit_glow, scale);
    }

    canvas.set_offset(0.0, 0.0);
}

fn draw_stars(canvas: &mut Canvas, frame: &VisualFrameState, color: Rgb) {
    let w = canvas.width() as f32;
    let band = canvas.height() as f32 * 0.8;
    let slot = (frame.elapsed * 8.0) as u32;
    for k in 0..STAR_COUNT {
        let x = (k as f32 * 123.0 + frame.elapsed * STAR_DRIFT) % w;
        let y = (k as f32 * 234.0) % band.max(1.0);
        let alpha = (0.3 + 0.5 * flicker(k, slot)) * (1.0 - frame.sunrise_mix);
        let size = flicker(k + STAR_COUNT, slot);
        canvas.fill_circle(x, y, size, color, alpha);
    }
}

fn draw_climber(canvas: &mut Canvas, frame: &VisualFrameState, color: Rgb, scale: f32) {
    let (x, y) = frame.climber_position(canvas.width() as f32, canvas.height() as f32);
    let body = scaled(CLIMBER_SIZE, scale, 1.0);
    let aura = body * 2.0 + frame.intensity * scaled(AURA_BOOST, scale, 4.0);
    let aura_alpha = (0.4 + frame.intensity * 0.4) * (1.0 - frame.sunrise_mix * 0.5);
    canvas.fill_radial(x, y, aura, Rgb::WHITE, aura_alpha, 0.0);
    canvas.fill_circle(x, y, body, color, 1.0);
}

fn draw_summit(canvas: &mut Canvas, day: f32, color: Rgb, scale: f32) {
    let w = canvas.width() as f32;
    let h = canvas.height() as f32;
    let base_y = terrain::ground_y(1.0, h);
    let x = w - scaled(FLAG_INSET, scale, 2.0);
    let top = base_y - scaled(FLAG_POLE, scale, 5.0);
    canvas.vline(x, top, base_y, color);
    // Glow is stronger at night.
    let glow = scaled(FLAG_GLOW, scale, 3.0);
    canvas.fill_radial(x, top, glow, color, 0.6 * (1.0 - day * 0.5), 0.0);
    canvas.fill_circle(x, top, scaled(FLAG_SIZE, scale, 1.0), color, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flicker_is_deterministic_and_bounded() {
        for k in 0..100 {
            let v = flicker(k, 7);
            assert_eq!(v, flicker(k, 7));
            assert!((0.0..=1.0).contains(&v));
        }
        assert_ne!(flicker(1, 1), flicker(1, 2));
    }

    #[test]
    fn scaled_sizes_have_floors() {
        assert_eq!(scaled(120.0, 1.0, 4.0), 120.0);
        assert_eq!(scaled(4.0, 0.25, 1.0), 1.0);
    }
}
