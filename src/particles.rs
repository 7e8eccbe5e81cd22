use crate::terrain;

const SPAWN_PER_FRAME: usize = 2;
const SPAWN_MIN_X: f32 = 0.1;
const SPAWN_SPAN_X: f32 = 0.8;
const SPAWN_LIFT: f32 = 5.0;
const GRAVITY: f32 = 0.5;
const BOUNCE: f32 = -0.4;
// Horizontal speed lost on each ground contact; debris drifts downhill (left)
const GROUND_DRAG: f32 = 0.5;
// A particle lives exactly this many ticks
const LIFETIME_TICKS: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    age: u16,
}

impl Particle {
    pub fn new(x: f32, y: f32, vx: f32, vy: f32, size: f32) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            size,
            age: 0,
        }
    }

    pub fn life(&self) -> f32 {
        (1.0 - self.age as f32 / LIFETIME_TICKS as f32).clamp(0.0, 1.0)
    }

    fn is_dead(&self) -> bool {
        self.age >= LIFETIME_TICKS
    }
}

#[derive(Debug, Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn push(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn step(&mut self, avalanche: bool, width: f32, height: f32, rng: &mut fastrand::Rng) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        if avalanche {
            for _ in 0..SPAWN_PER_FRAME {
                let x_norm = SPAWN_MIN_X + rng.f32() * SPAWN_SPAN_X;
                self.particles.push(Particle::new(
                    x_norm * width,
                    terrain::ground_y(x_norm, height) - SPAWN_LIFT,
                    (rng.f32() - 0.5) * 2.0,
                    0.0,
                    2.0 + rng.f32() * 3.0,
                ));
            }
        }

        for p in &mut self.particles {
            p.vy += GRAVITY;
            p.x += p.vx;
            p.y += p.vy;
            p.age = p.age.saturating_add(1);

            let x_norm = p.x / width;
            if !(0.0..=1.0).contains(&x_norm) || p.y > height {
                p.age = LIFETIME_TICKS;
                continue;
            }
            let ground = terrain::ground_y(x_norm, height);
            if p.y > ground {
                p.y = ground;
                p.vy *= BOUNCE;
                p.vx -= GROUND_DRAG;
            }
        }
        self.particles.retain(|p| !p.is_dead());
    }
}
