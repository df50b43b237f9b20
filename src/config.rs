use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    error::Result,
    render::Filter,
    types::{ColorChoice, Rgb, Vec2},
};

pub const FRAME_HZ: f32 = 60.0;

/// Container pixels covered by one terminal cell.
pub const CELL_WIDTH_PX: f32 = 6.0;
pub const CELL_HEIGHT_PX: f32 = 12.0;

pub const MAX_GLYPHS: usize = 15;
pub const REPLICATION_FACTOR: usize = 3;

pub const RADIUS_MIN: f32 = 12.0;
pub const RADIUS_MAX: f32 = 25.0;
pub const RADIUS_BASE: f32 = 30.0;
pub const RADIUS_VARIANCE: f32 = 25.0;

pub const SPAWN_SIDE_INSET: f32 = 50.0;
pub const SPAWN_TOP_INSET: f32 = 20.0;
pub const SPAWN_BAND: f32 = 0.3;

pub const WALL_THICKNESS: f32 = 50.0;
pub const SPATIAL_CELL_SIZE: f32 = 2.0 * RADIUS_MAX;
pub const SOLVER_ITERATIONS: usize = 4;

pub const GRAVITY_Y: f32 = 0.8;
pub const GRAVITY_SCALE: f32 = 0.25;

pub const RESTITUTION: f32 = 0.6;
pub const FRICTION: f32 = 0.05;
pub const AIR_FRICTION: f32 = 0.01;
pub const DENSITY: f32 = 0.0008;

pub const SHAKE_COOLDOWN_MS: u64 = 500;
pub const SHAKE_STRENGTH: f32 = 9.0;
pub const CORNER_BOOST: f32 = 1.5;
pub const CORNER_JITTER: f32 = 0.25;
pub const CORNER_SPIN: f32 = 0.05;

pub const JERK_THRESHOLD: f32 = 2.0;
pub const JERK_GAIN: f32 = 0.1;
pub const JERK_CAP: f32 = 1.0;
pub const LOUD_CUE_FACTOR: f32 = 1.5;
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 10;

pub const CORNER_THRESHOLD: f32 = 30.0;
pub const CORRECTION_FORCE: f32 = 0.02;

pub const TILT_SMOOTHING: f32 = 0.15;
pub const TILT_MAX_DEGREES: f32 = 45.0;
pub const TILT_X_RANGE: f32 = 0.5;
pub const TILT_Y_BASE: f32 = 0.25;
pub const TILT_Y_RANGE: f32 = 0.45;

pub const DEFAULT_CHARM_COLOR: Rgb = Rgb::hex(0x4A90E2);
pub const NEUTRAL_FILL: Rgb = Rgb::hex(0xF3F4F6);

/// How many bodies a spec of `L` glyphs produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReplicationPolicy {
    /// `factor` bodies for every glyph.
    PerGlyph { factor: usize },
    /// `max(minimum, factor * L)` bodies, spread over the glyphs in order.
    AtLeast { factor: usize, minimum: usize },
}

impl ReplicationPolicy {
    pub fn total(self, glyphs: usize) -> usize {
        if glyphs == 0 {
            return 0;
        }
        match self {
            ReplicationPolicy::PerGlyph { factor } => factor * glyphs,
            ReplicationPolicy::AtLeast { factor, minimum } => minimum.max(factor * glyphs),
        }
    }

    /// Copies of each glyph before the total cap is applied.
    pub fn per_glyph(self, glyphs: usize) -> usize {
        if glyphs == 0 {
            return 0;
        }
        self.total(glyphs).div_ceil(glyphs)
    }
}

impl Default for ReplicationPolicy {
    fn default() -> Self {
        ReplicationPolicy::PerGlyph {
            factor: REPLICATION_FACTOR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Material {
    pub restitution: f32,
    pub friction: f32,
    pub air_friction: f32,
    pub density: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: RESTITUTION,
            friction: FRICTION,
            air_friction: AIR_FRICTION,
            density: DENSITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity in "gravity units"; multiplied by `gravity_scale` per frame.
    pub gravity: [f32; 2],
    pub gravity_scale: f32,
    pub solver_iterations: usize,
    pub material: Material,
}

impl PhysicsConfig {
    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity[0], self.gravity[1])
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, GRAVITY_Y],
            gravity_scale: GRAVITY_SCALE,
            solver_iterations: SOLVER_ITERATIONS,
            material: Material::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub replication: ReplicationPolicy,
    pub max_glyphs: usize,
    pub radius_base: f32,
    pub radius_variance: f32,
    pub spawn_side_inset: f32,
    pub spawn_top_inset: f32,
    pub spawn_band: f32,
    pub keep_bounds_when_empty: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            replication: ReplicationPolicy::default(),
            max_glyphs: MAX_GLYPHS,
            radius_base: RADIUS_BASE,
            radius_variance: RADIUS_VARIANCE,
            spawn_side_inset: SPAWN_SIDE_INSET,
            spawn_top_inset: SPAWN_TOP_INSET,
            spawn_band: SPAWN_BAND,
            keep_bounds_when_empty: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShakeConfig {
    pub cooldown_ms: u64,
    pub strength: f32,
    pub corner_boost: f32,
    pub corner_jitter: f32,
    pub corner_spin: f32,
    pub jerk_threshold: f32,
    pub jerk_gain: f32,
    pub jerk_cap: f32,
    pub loud_cue_factor: f32,
    pub min_sample_interval_ms: u64,
}

impl ShakeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn min_sample_interval(&self) -> Duration {
        Duration::from_millis(self.min_sample_interval_ms)
    }
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: SHAKE_COOLDOWN_MS,
            strength: SHAKE_STRENGTH,
            corner_boost: CORNER_BOOST,
            corner_jitter: CORNER_JITTER,
            corner_spin: CORNER_SPIN,
            jerk_threshold: JERK_THRESHOLD,
            jerk_gain: JERK_GAIN,
            jerk_cap: JERK_CAP,
            loud_cue_factor: LOUD_CUE_FACTOR,
            min_sample_interval_ms: MIN_SAMPLE_INTERVAL_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorrectorConfig {
    pub corner_threshold: f32,
    pub force: f32,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            corner_threshold: CORNER_THRESHOLD,
            force: CORRECTION_FORCE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TiltConfig {
    pub smoothing: f32,
    pub max_degrees: f32,
    pub x_range: f32,
    pub y_base: f32,
    pub y_range: f32,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            smoothing: TILT_SMOOTHING,
            max_degrees: TILT_MAX_DEGREES,
            x_range: TILT_X_RANGE,
            y_base: TILT_Y_BASE,
            y_range: TILT_Y_RANGE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub pool: PoolConfig,
    pub shake: ShakeConfig,
    pub corrector: CorrectorConfig,
    pub tilt: TiltConfig,
    pub charm_color: Option<ColorChoice>,
    pub filter: Filter,
    pub mobile: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            pool: PoolConfig::default(),
            shake: ShakeConfig::default(),
            corrector: CorrectorConfig::default(),
            tilt: TiltConfig::default(),
            charm_color: None,
            filter: Filter::None,
            mobile: false,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }
}
