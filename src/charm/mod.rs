use std::{
    collections::hash_map::DefaultHasher,
    hash::Hasher,
};

use rand::Rng;

use crate::{
    config::{self, Material, PoolConfig},
    error::{EngineError, Result},
    physics::{Boundary, PhysicsWorld},
    types::{BodyId, ColorChoice, Size, Vec2},
};

const ZWJ: char = '\u{200D}';

/// The ordered, capped list of glyphs the user picked. Replaced wholesale on
/// every edit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharmSpec {
    glyphs: Vec<String>,
}

impl CharmSpec {
    /// Splits `text` into glyph units, keeping emoji modifiers and joined
    /// sequences together. Whitespace and control characters are dropped.
    pub fn parse(text: &str, max_glyphs: usize) -> Self {
        let mut glyphs: Vec<String> = Vec::new();
        let mut join_next = false;
        for ch in text.chars() {
            if ch.is_whitespace() || ch.is_control() {
                join_next = false;
                continue;
            }
            let attach = join_next || is_continuation(ch);
            join_next = ch == ZWJ;
            match glyphs.last_mut() {
                Some(last) if attach => last.push(ch),
                _ => glyphs.push(ch.to_string()),
            }
        }
        if glyphs.len() > max_glyphs {
            log::debug!("charm spec capped at {max_glyphs} of {} glyphs", glyphs.len());
            glyphs.truncate(max_glyphs);
        }
        Self { glyphs }
    }

    pub fn glyphs(&self) -> &[String] {
        &self.glyphs
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn concat(&self) -> String {
        self.glyphs.concat()
    }

    /// Identity of the charm text: a hash of the concatenated glyphs.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for glyph in &self.glyphs {
            hasher.write(glyph.as_bytes());
        }
        hasher.finish()
    }
}

fn is_continuation(ch: char) -> bool {
    matches!(ch,
        '\u{FE00}'..='\u{FE0F}'
        | '\u{0300}'..='\u{036F}'
        | '\u{20E3}'
        | '\u{1F3FB}'..='\u{1F3FF}'
        | '\u{E0020}'..='\u{E007F}'
        | ZWJ)
}

/// Pool-side record of one charm. The physics state lives in the world under
/// `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct CharmBody {
    pub id: BodyId,
    pub glyph: String,
    /// Position of the glyph in the charm text; drives the rainbow palette.
    pub glyph_index: usize,
    pub radius: f32,
    pub color: Option<ColorChoice>,
}

impl CharmBody {
    pub fn font_size(&self) -> f32 {
        self.radius * 2.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildOutcome {
    Unchanged,
    Rebuilt { bodies: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct AppliedKey {
    fingerprint: u64,
    container: Size,
}

pub struct BodyPool {
    config: PoolConfig,
    material: Material,
    bodies: Vec<CharmBody>,
    applied: Option<AppliedKey>,
}

impl BodyPool {
    pub fn new(config: PoolConfig, material: Material) -> Self {
        Self {
            config,
            material,
            bodies: Vec::new(),
            applied: None,
        }
    }

    pub fn bodies(&self) -> &[CharmBody] {
        &self.bodies
    }

    pub fn max_glyphs(&self) -> usize {
        self.config.max_glyphs
    }

    /// Container the current bodies were built for.
    #[cfg(test)]
    pub fn container(&self) -> Option<Size> {
        self.applied.map(|key| key.container)
    }

    /// Rebuilds bodies and boundaries when the charm text or the container changed
    /// since the last successful call; otherwise leaves the world alone.
    pub fn rebuild<R: Rng>(
        &mut self,
        spec: &CharmSpec,
        container: Size,
        world: &mut PhysicsWorld,
        rng: &mut R,
    ) -> Result<RebuildOutcome> {
        if container.is_empty() {
            log::warn!(
                "skipping charm rebuild for {}x{} container",
                container.width,
                container.height
            );
            return Err(EngineError::InvalidDimensions {
                width: container.width,
                height: container.height,
            });
        }
        let key = AppliedKey {
            fingerprint: spec.fingerprint(),
            container,
        };
        if self.applied == Some(key) {
            return Ok(RebuildOutcome::Unchanged);
        }

        for body in self.bodies.drain(..) {
            world.remove_body(body.id);
        }
        world.clear_boundaries();
        if !spec.is_empty() || self.config.keep_bounds_when_empty {
            world.set_boundaries(&Boundary::enclosing(container, config::WALL_THICKNESS));
        }

        let target = self.config.replication.total(spec.len());
        let per_glyph = self.config.replication.per_glyph(spec.len());
        'glyphs: for (glyph_index, glyph) in spec.glyphs().iter().enumerate() {
            for _ in 0..per_glyph {
                if self.bodies.len() >= target {
                    break 'glyphs;
                }
                let radius = self.random_radius(rng);
                let pos = self.spawn_position(container, radius, rng);
                let id = world.add_circle(pos, radius, self.material);
                self.bodies.push(CharmBody {
                    id,
                    glyph: glyph.clone(),
                    glyph_index,
                    radius,
                    color: None,
                });
            }
        }

        self.applied = Some(key);
        log::debug!(
            "rebuilt {} charm bodies from {:?} in {}x{}",
            self.bodies.len(),
            spec.concat(),
            container.width,
            container.height
        );
        Ok(RebuildOutcome::Rebuilt {
            bodies: self.bodies.len(),
        })
    }

    fn random_radius<R: Rng>(&self, rng: &mut R) -> f32 {
        let variation = (rng.gen_range(0.0_f32..1.0) - 0.5) * self.config.radius_variance;
        ((self.config.radius_base + variation) / 2.0).clamp(config::RADIUS_MIN, config::RADIUS_MAX)
    }

    fn spawn_position<R: Rng>(&self, container: Size, radius: f32, rng: &mut R) -> Vec2 {
        let inset = self.config.spawn_side_inset;
        let top = self.config.spawn_top_inset;
        let x = sample_span(rng, inset, container.width - inset);
        let y = sample_span(rng, top, top + container.height * self.config.spawn_band);
        Vec2::new(
            keep_inside(x, radius, container.width),
            keep_inside(y, radius, container.height),
        )
    }
}

fn sample_span<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        (lo + hi) / 2.0
    }
}

fn keep_inside(value: f32, radius: f32, extent: f32) -> f32 {
    if extent > radius * 2.0 {
        value.clamp(radius, extent - radius)
    } else {
        extent / 2.0
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::{PhysicsConfig, ReplicationPolicy};

    fn pool_with(replication: ReplicationPolicy) -> BodyPool {
        let config = PoolConfig {
            replication,
            ..PoolConfig::default()
        };
        BodyPool::new(config, Material::default())
    }

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig::default())
    }

    mod charm_spec_parse {
        use super::*;

        #[test]
        fn splits_into_scalar_units() {
            let spec = CharmSpec::parse("AB✨", 15);
            assert_eq!(spec.glyphs(), ["A", "B", "✨"]);
        }

        #[test]
        fn caps_length() {
            let spec = CharmSpec::parse("ABCDEFGHIJKLMNOPQRSTUVWXYZ", 15);
            assert_eq!(spec.len(), 15);
            assert_eq!(spec.glyphs().last().map(String::as_str), Some("O"));
        }

        #[test]
        fn drops_whitespace() {
            let spec = CharmSpec::parse(" a b\tc\n", 15);
            assert_eq!(spec.concat(), "abc");
        }

        #[test]
        fn keeps_modifier_sequences_together() {
            let spec = CharmSpec::parse("❤\u{FE0F}👍\u{1F3FD}👩\u{200D}💻x", 15);
            assert_eq!(spec.len(), 4);
            assert_eq!(spec.glyphs()[0], "❤\u{FE0F}");
            assert_eq!(spec.glyphs()[1], "👍\u{1F3FD}");
            assert_eq!(spec.glyphs()[2], "👩\u{200D}💻");
        }

        #[test]
        fn fingerprint_tracks_content() {
            let a = CharmSpec::parse("AB", 15);
            let b = CharmSpec::parse("A B", 15);
            let c = CharmSpec::parse("BA", 15);
            assert_eq!(a.fingerprint(), b.fingerprint());
            assert_ne!(a.fingerprint(), c.fingerprint());
        }
    }

    mod rebuild {
        use super::*;

        const CONTAINER: Size = Size {
            width: 400.0,
            height: 300.0,
        };

        #[test]
        fn body_count_follows_policy_for_every_length() {
            let text = "ABCDEFGHIJKLMNO";
            let policies = [
                ReplicationPolicy::PerGlyph { factor: 3 },
                ReplicationPolicy::PerGlyph { factor: 1 },
                ReplicationPolicy::AtLeast {
                    factor: 2,
                    minimum: 20,
                },
            ];
            for policy in policies {
                for len in 0..=15 {
                    let mut pool = pool_with(policy);
                    let mut world = world();
                    let mut rng = StdRng::seed_from_u64(len as u64);
                    let spec = CharmSpec::parse(&text[..len], 15);
                    pool.rebuild(&spec, CONTAINER, &mut world, &mut rng).unwrap();
                    assert_eq!(pool.bodies().len(), policy.total(len), "{policy:?} L={len}");
                    assert_eq!(world.bodies().len(), policy.total(len));
                    for body in pool.bodies() {
                        assert!((config::RADIUS_MIN..=config::RADIUS_MAX).contains(&body.radius));
                    }
                }
            }
        }

        #[test]
        fn spawns_in_upper_band_away_from_sides() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(9);
            let spec = CharmSpec::parse("ABCDE", 15);
            pool.rebuild(&spec, CONTAINER, &mut world, &mut rng).unwrap();
            for body in world.bodies() {
                assert!(body.pos.x >= 50.0 && body.pos.x <= 350.0);
                assert!(body.pos.y >= body.radius && body.pos.y <= 20.0 + 90.0);
            }
        }

        #[test]
        fn unchanged_inputs_are_a_no_op() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(1);
            let spec = CharmSpec::parse("AB", 15);
            pool.rebuild(&spec, CONTAINER, &mut world, &mut rng).unwrap();
            world.step();
            let before: Vec<(BodyId, Vec2)> = world.bodies().iter().map(|b| (b.id, b.pos)).collect();

            let outcome = pool.rebuild(&spec.clone(), CONTAINER, &mut world, &mut rng).unwrap();

            assert_eq!(outcome, RebuildOutcome::Unchanged);
            let after: Vec<(BodyId, Vec2)> = world.bodies().iter().map(|b| (b.id, b.pos)).collect();
            assert_eq!(before, after);
        }

        #[test]
        fn resize_forces_rebuild() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 2 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(2);
            let spec = CharmSpec::parse("AB", 15);
            pool.rebuild(&spec, CONTAINER, &mut world, &mut rng).unwrap();
            let old_ids: Vec<BodyId> = pool.bodies().iter().map(|b| b.id).collect();

            let bigger = Size::new(600.0, 500.0);
            let outcome = pool.rebuild(&spec, bigger, &mut world, &mut rng).unwrap();

            assert_eq!(outcome, RebuildOutcome::Rebuilt { bodies: 4 });
            assert_eq!(world.bodies().len(), 4);
            assert!(old_ids.iter().all(|id| world.body(*id).is_none()));
            assert_eq!(world.boundaries()[3].min.x, 600.0);
            assert_eq!(pool.container(), Some(bigger));
        }

        #[test]
        fn spec_edit_replaces_bodies() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(3);
            pool.rebuild(&CharmSpec::parse("AB", 15), CONTAINER, &mut world, &mut rng)
                .unwrap();
            pool.rebuild(&CharmSpec::parse("XYZ", 15), CONTAINER, &mut world, &mut rng)
                .unwrap();
            assert_eq!(world.bodies().len(), 9);
            assert!(pool.bodies().iter().all(|b| ["X", "Y", "Z"].contains(&b.glyph.as_str())));
            assert_eq!(world.boundaries().len(), 4);
        }

        #[test]
        fn zero_sized_container_is_rejected_then_retried() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(4);
            let spec = CharmSpec::parse("AB", 15);

            let err = pool
                .rebuild(&spec, Size::new(0.0, 300.0), &mut world, &mut rng)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidDimensions { .. }));
            assert!(pool.bodies().is_empty());

            let outcome = pool.rebuild(&spec, CONTAINER, &mut world, &mut rng).unwrap();
            assert_eq!(outcome, RebuildOutcome::Rebuilt { bodies: 6 });
        }

        #[test]
        fn empty_spec_keeps_bounds_by_default() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(5);
            pool.rebuild(&CharmSpec::default(), CONTAINER, &mut world, &mut rng)
                .unwrap();
            assert!(world.bodies().is_empty());
            assert_eq!(world.boundaries().len(), 4);
        }

        #[test]
        fn empty_spec_can_drop_bounds() {
            let config = PoolConfig {
                keep_bounds_when_empty: false,
                ..PoolConfig::default()
            };
            let mut pool = BodyPool::new(config, Material::default());
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(6);
            pool.rebuild(&CharmSpec::default(), CONTAINER, &mut world, &mut rng)
                .unwrap();
            assert!(world.boundaries().is_empty());
        }

        #[test]
        fn two_glyphs_three_copies_stay_in_bounds() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 3 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(42);
            pool.rebuild(&CharmSpec::parse("AB", 15), CONTAINER, &mut world, &mut rng)
                .unwrap();

            assert_eq!(pool.bodies().len(), 6);
            assert_eq!(pool.bodies().iter().filter(|b| b.glyph == "A").count(), 3);
            assert_eq!(pool.bodies().iter().filter(|b| b.glyph == "B").count(), 3);

            world.step();
            for body in world.bodies() {
                assert!(body.pos.x >= 0.0 && body.pos.x <= CONTAINER.width, "{:?}", body.pos);
                assert!(body.pos.y >= 0.0 && body.pos.y <= CONTAINER.height, "{:?}", body.pos);
            }
        }

        #[test]
        fn narrow_container_centers_spawns() {
            let mut pool = pool_with(ReplicationPolicy::PerGlyph { factor: 1 });
            let mut world = world();
            let mut rng = StdRng::seed_from_u64(7);
            let narrow = Size::new(60.0, 300.0);
            pool.rebuild(&CharmSpec::parse("A", 15), narrow, &mut world, &mut rng)
                .unwrap();
            assert_eq!(world.bodies()[0].pos.x, 30.0);
        }
    }
}
