//! Shake impulses and the corner nudge. Both work off the same corner zone.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::{
    audio::{Cue, SoundCue},
    charm::CharmBody,
    config::{CorrectorConfig, ShakeConfig},
    error::{EngineError, Result},
    physics::PhysicsWorld,
    types::{Size, Vec2},
};

/// Unit direction from `pos` toward the container center when the body
/// surface is within `threshold` of two perpendicular edges.
pub fn corner_escape(pos: Vec2, radius: f32, container: Size, threshold: f32) -> Option<Vec2> {
    let near_left = pos.x - radius <= threshold;
    let near_right = container.width - pos.x - radius <= threshold;
    let near_top = pos.y - radius <= threshold;
    let near_bottom = container.height - pos.y - radius <= threshold;
    let horizontal = near_left || near_right;
    let vertical = near_top || near_bottom;
    if !(horizontal && vertical) {
        return None;
    }
    let to_center = container.center() - pos;
    if to_center.length_sq() == 0.0 {
        return None;
    }
    Some(to_center.normalize())
}

/// Applies the corner nudge to every stuck body. Returns how many were nudged.
pub fn correct_corners(
    bodies: &[CharmBody],
    world: &mut PhysicsWorld,
    container: Size,
    config: &CorrectorConfig,
) -> usize {
    let mut nudged = 0;
    for charm in bodies {
        let Some(body) = world.body(charm.id) else {
            continue;
        };
        if let Some(dir) = corner_escape(body.pos, body.radius, container, config.corner_threshold) {
            world.apply_force(charm.id, dir * config.force);
            nudged += 1;
        }
    }
    nudged
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShakeState {
    Idle,
    Shaking { since: Instant },
}

/// One accelerometer reading, gravity included, in m/s².
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    pub accel: [f32; 3],
    pub at: Instant,
}

/// Everything a shake touches, borrowed for the duration of one trigger.
pub struct ShakeTarget<'a, R: Rng> {
    pub bodies: &'a [CharmBody],
    pub world: &'a mut PhysicsWorld,
    pub container: Size,
    pub corner_threshold: f32,
    pub rng: &'a mut R,
    pub audio: &'a mut dyn SoundCue,
}

pub struct ShakeController {
    config: ShakeConfig,
    state: ShakeState,
    last_motion: Option<MotionSample>,
    sensors: bool,
}

impl ShakeController {
    pub fn new(config: ShakeConfig) -> Self {
        Self {
            config,
            state: ShakeState::Idle,
            last_motion: None,
            sensors: true,
        }
    }

    pub fn state(&self) -> ShakeState {
        self.state
    }

    pub fn sensors_enabled(&self) -> bool {
        self.sensors
    }

    /// Motion data stopped or was never granted. Explicit triggers still work.
    pub fn disable_sensors(&mut self) {
        self.sensors = false;
        self.last_motion = None;
    }

    /// Ends the cooldown once it has elapsed.
    pub fn tick(&mut self, now: Instant) {
        if let ShakeState::Shaking { since } = self.state {
            if now.saturating_duration_since(since) >= self.config.cooldown() {
                self.state = ShakeState::Idle;
            }
        }
    }

    /// Explicit trigger (button, tap, click). Returns true when an impulse
    /// was applied.
    pub fn on_trigger<R: Rng>(&mut self, now: Instant, target: ShakeTarget<'_, R>) -> bool {
        if !self.begin(now, target.bodies) {
            return false;
        }
        self.apply_impulses(1.0, target.bodies, target.world, target.container, target.corner_threshold, target.rng);
        target.audio.play(Cue::Shake);
        true
    }

    /// Sensor path: fires when the jerk between consecutive samples exceeds
    /// the threshold.
    pub fn on_motion<R: Rng>(
        &mut self,
        sample: MotionSample,
        target: ShakeTarget<'_, R>,
    ) -> Result<bool> {
        if !self.sensors {
            return Err(EngineError::SensorUnavailable("motion sensor disabled".into()));
        }
        let Some(previous) = self.last_motion else {
            self.last_motion = Some(sample);
            return Ok(false);
        };
        if sample.at.saturating_duration_since(previous.at) < self.config.min_sample_interval() {
            return Ok(false);
        }
        self.last_motion = Some(sample);

        let magnitude = jerk_magnitude(previous.accel, sample.accel);
        if magnitude <= self.config.jerk_threshold {
            return Ok(false);
        }
        if !self.begin(sample.at, target.bodies) {
            return Ok(false);
        }
        let scale = (magnitude * self.config.jerk_gain).min(self.config.jerk_cap);
        self.apply_impulses(scale, target.bodies, target.world, target.container, target.corner_threshold, target.rng);
        if magnitude > self.config.jerk_threshold * self.config.loud_cue_factor {
            target.audio.play(Cue::LoudShake);
        }
        log::debug!("sensor shake: jerk {magnitude:.2}, scale {scale:.2}");
        Ok(true)
    }

    fn begin(&mut self, now: Instant, bodies: &[CharmBody]) -> bool {
        self.tick(now);
        if self.state != ShakeState::Idle || bodies.is_empty() {
            return false;
        }
        self.state = ShakeState::Shaking { since: now };
        true
    }

    fn apply_impulses<R: Rng>(
        &self,
        scale: f32,
        bodies: &[CharmBody],
        world: &mut PhysicsWorld,
        container: Size,
        corner_threshold: f32,
        rng: &mut R,
    ) {
        let strength = self.config.strength * scale;
        for charm in bodies {
            let Some(body) = world.body(charm.id) else {
                continue;
            };
            let (delta_v, spin) = match corner_escape(body.pos, body.radius, container, corner_threshold) {
                Some(escape) => {
                    let jitter = rng.gen_range(-self.config.corner_jitter..=self.config.corner_jitter);
                    let spin = rng.gen_range(-self.config.corner_spin..=self.config.corner_spin);
                    (escape.rotate(jitter) * (strength * self.config.corner_boost), spin)
                }
                None => {
                    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                    (Vec2::from_angle(angle) * strength, 0.0)
                }
            };
            world.apply_impulse(charm.id, delta_v, spin);
        }
    }
}

fn jerk_magnitude(previous: [f32; 3], current: [f32; 3]) -> f32 {
    previous
        .iter()
        .zip(current.iter())
        .map(|(a, b)| (b - a) * (b - a))
        .sum::<f32>()
        .sqrt()
}

/// Remaining cooldown, for status display.
pub fn cooldown_left(state: ShakeState, cooldown: Duration, now: Instant) -> Duration {
    match state {
        ShakeState::Idle => Duration::ZERO,
        ShakeState::Shaking { since } => cooldown.saturating_sub(now.saturating_duration_since(since)),
    }
}
