use std::time::{Duration, Instant};

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    audio::SoundCue,
    charm::{BodyPool, CharmSpec, RebuildOutcome},
    config::{self, SimConfig},
    control::{self, MotionSample, ShakeController, ShakeState, ShakeTarget},
    error::{EngineError, Result},
    glyph::{BeadRasterizer, Drawable, GlyphCache, GlyphEvent, SlotState},
    physics::PhysicsWorld,
    render::{self, Backdrop, Filter, FrameBuffer, Placement, Projection},
    tilt::{Orientation, TiltMapper},
    types::{ColorChoice, Size, Vec2},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub bodies: usize,
    pub rebuilt: bool,
    /// Charms drawn as plain text this frame.
    pub fallbacks: usize,
    /// Fallbacks replaced by their raster once it finished.
    pub upgraded: usize,
    pub failed: usize,
    pub corrected: usize,
}

/// Everything one card needs between frames. The host owns it and drives it
/// with `frame` plus the input handlers.
pub struct Simulation {
    config: SimConfig,
    world: PhysicsWorld,
    pool: BodyPool,
    glyphs: GlyphCache<BeadRasterizer>,
    shake: ShakeController,
    tilt: TiltMapper,
    rng: StdRng,
    audio: Box<dyn SoundCue>,
    spec: CharmSpec,
    container: Size,
    filter: Filter,
    placements: Vec<(usize, Placement, Drawable)>,
    last_stats: FrameStats,
}

impl Simulation {
    pub fn new(config: SimConfig, seed: Option<u64>, audio: Box<dyn SoundCue>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            world: PhysicsWorld::new(&config.physics),
            pool: BodyPool::new(config.pool.clone(), config.physics.material),
            glyphs: GlyphCache::new(BeadRasterizer, config.charm_color),
            shake: ShakeController::new(config.shake.clone()),
            tilt: TiltMapper::new(config.tilt.clone(), config.mobile, config.physics.gravity()),
            rng,
            audio,
            spec: CharmSpec::default(),
            container: Size::default(),
            filter: config.filter,
            placements: Vec::new(),
            last_stats: FrameStats::default(),
            config,
        }
    }

    pub fn spec(&self) -> &CharmSpec {
        &self.spec
    }

    /// Replaces the charm text. Bodies follow on the next frame.
    pub fn set_spec(&mut self, text: &str) {
        self.spec = CharmSpec::parse(text, self.pool.max_glyphs());
    }

    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    #[cfg(test)]
    pub fn bodies(&self) -> &[crate::charm::CharmBody] {
        self.pool.bodies()
    }

    #[cfg(test)]
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Cached glyph rasters in `state`.
    pub fn glyph_count(&self, state: SlotState) -> usize {
        self.glyphs.count(state)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn charm_color(&self) -> Option<ColorChoice> {
        self.glyphs.charm_color()
    }

    pub fn set_charm_color(&mut self, color: Option<ColorChoice>) {
        self.glyphs.set_charm_color(color);
    }

    pub fn gravity(&self) -> Vec2 {
        self.world.gravity
    }

    pub fn is_mobile(&self) -> bool {
        self.config.mobile
    }

    pub fn set_mobile(&mut self, mobile: bool) {
        self.config.mobile = mobile;
        if !mobile {
            self.world.gravity = self.config.physics.gravity();
        }
        self.tilt.set_mobile(mobile, self.world.gravity);
    }

    pub fn tilt_active(&self) -> bool {
        self.tilt.is_active()
    }

    pub fn sensors_enabled(&self) -> bool {
        self.shake.sensors_enabled()
    }

    pub fn shake_state(&self) -> ShakeState {
        self.shake.state()
    }

    pub fn cooldown_left(&self, now: Instant) -> Duration {
        control::cooldown_left(self.shake.state(), self.config.shake.cooldown(), now)
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Runs one display frame onto `surface`.
    pub fn frame(
        &mut self,
        now: Instant,
        surface: &mut FrameBuffer,
        backdrop: Option<&Backdrop>,
    ) -> Result<FrameStats> {
        self.shake.tick(now);
        let backdrop = match backdrop {
            Some(backdrop) if !surface.is_empty() => backdrop,
            _ => {
                surface.fill(config::NEUTRAL_FILL);
                let missing = if surface.is_empty() { "render surface" } else { "backdrop image" };
                return Err(EngineError::ResourceUnavailable(missing));
            }
        };

        let mut stats = FrameStats::default();
        match self
            .pool
            .rebuild(&self.spec, self.container, &mut self.world, &mut self.rng)
        {
            Ok(RebuildOutcome::Rebuilt { .. }) => stats.rebuilt = true,
            Ok(RebuildOutcome::Unchanged) => {}
            Err(err) => log::debug!("rebuild skipped: {err}"),
        }

        self.world.step();
        render::paint_background(surface, backdrop, self.filter);
        if !self.container.is_empty() {
            self.draw_charms(surface, &mut stats);
            stats.corrected = control::correct_corners(
                self.pool.bodies(),
                &mut self.world,
                self.container,
                &self.config.corrector,
            );
        }
        stats.bodies = self.pool.bodies().len();
        self.last_stats = stats;
        Ok(stats)
    }

    fn draw_charms(&mut self, surface: &mut FrameBuffer, stats: &mut FrameStats) {
        let projection = Projection::new(surface, self.container);
        self.placements.clear();
        for (index, charm) in self.pool.bodies().iter().enumerate() {
            let Some(body) = self.world.body(charm.id) else {
                continue;
            };
            let at = Placement::clamped(body.pos, charm.radius, body.angle, self.container);
            let drawable =
                self.glyphs
                    .resolve(&charm.glyph, charm.font_size(), charm.color, charm.glyph_index);
            if matches!(drawable, Drawable::Text(_)) {
                stats.fallbacks += 1;
            }
            self.placements.push((index, at, drawable));
        }

        for event in self.glyphs.complete_pending() {
            if let GlyphEvent::Failed(_) = event {
                stats.failed += 1;
            }
        }

        // Every charm is drawn once, in pool order, so z-order does not depend
        // on when its raster finished.
        for (index, at, drawable) in &mut self.placements {
            if matches!(drawable, Drawable::Text(_)) {
                let charm = &self.pool.bodies()[*index];
                let resolved =
                    self.glyphs
                        .resolve(&charm.glyph, charm.font_size(), charm.color, charm.glyph_index);
                if matches!(resolved, Drawable::Raster(_)) {
                    *drawable = resolved;
                    stats.upgraded += 1;
                }
            }
            render::draw_charm(surface, projection, drawable, *at);
        }
    }

    /// Tap, click or button press.
    pub fn on_trigger(&mut self, now: Instant) -> bool {
        let target = ShakeTarget {
            bodies: self.pool.bodies(),
            world: &mut self.world,
            container: self.container,
            corner_threshold: self.config.corrector.corner_threshold,
            rng: &mut self.rng,
            audio: self.audio.as_mut(),
        };
        self.shake.on_trigger(now, target)
    }

    pub fn on_motion(&mut self, sample: MotionSample) -> Result<bool> {
        let target = ShakeTarget {
            bodies: self.pool.bodies(),
            world: &mut self.world,
            container: self.container,
            corner_threshold: self.config.corrector.corner_threshold,
            rng: &mut self.rng,
            audio: self.audio.as_mut(),
        };
        self.shake.on_motion(sample, target)
    }

    pub fn on_orientation(&mut self, sample: Orientation) -> Result<()> {
        if let Some(gravity) = self.tilt.on_orientation(sample)? {
            self.world.gravity = gravity;
        }
        Ok(())
    }

    /// Permission denied or the sensors went away: stop listening and keep
    /// the fixed gravity. Explicit triggers keep working.
    pub fn sensor_unavailable(&mut self, reason: &str) {
        if self.shake.sensors_enabled() {
            log::warn!("sensors unavailable: {reason}");
        }
        self.shake.disable_sensors();
        self.tilt.disable();
        self.world.gravity = self.config.physics.gravity();
        self.tilt.reseed(self.world.gravity);
    }
}
