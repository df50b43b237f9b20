use crate::{
    config::TiltConfig,
    error::{EngineError, Result},
    types::Vec2,
};

/// Device orientation in degrees: pitch is front/back tilt, roll is
/// left/right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub pitch: f32,
    pub roll: f32,
}

/// Eases the world gravity toward the direction the device is tilted.
/// Desktop hosts keep the fixed gravity they started with.
pub struct TiltMapper {
    config: TiltConfig,
    mobile: bool,
    available: bool,
    gravity: Vec2,
    target: Vec2,
}

impl TiltMapper {
    pub fn new(config: TiltConfig, mobile: bool, initial_gravity: Vec2) -> Self {
        Self {
            config,
            mobile,
            available: true,
            gravity: initial_gravity,
            target: initial_gravity,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mobile && self.available
    }

    /// Switches host mode. Smoothing restarts from `gravity`, the vector in
    /// effect after the switch.
    pub fn set_mobile(&mut self, mobile: bool, gravity: Vec2) {
        self.mobile = mobile;
        self.reseed(gravity);
    }

    /// Forgets the smoothed state and continues from `gravity`.
    pub fn reseed(&mut self, gravity: Vec2) {
        self.gravity = gravity;
        self.target = gravity;
    }

    pub fn disable(&mut self) {
        self.available = false;
    }

    #[cfg(test)]
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    #[cfg(test)]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Feeds one orientation sample. Returns the smoothed gravity to apply,
    /// or `None` when the mapper is inactive on this host.
    pub fn on_orientation(&mut self, sample: Orientation) -> Result<Option<Vec2>> {
        if !self.available {
            return Err(EngineError::SensorUnavailable("orientation disabled".into()));
        }
        if !self.mobile {
            return Ok(None);
        }
        self.target = self.target_for(sample);
        self.gravity = self.gravity.lerp(self.target, self.config.smoothing);
        Ok(Some(self.gravity))
    }

    fn target_for(&self, sample: Orientation) -> Vec2 {
        let pitch = self.normalize(sample.pitch);
        let roll = self.normalize(sample.roll);
        Vec2::new(
            roll * self.config.x_range,
            self.config.y_base + pitch * self.config.y_range,
        )
    }

    fn normalize(&self, degrees: f32) -> f32 {
        if !degrees.is_finite() {
            return 0.0;
        }
        (degrees / self.config.max_degrees).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mobile() -> TiltMapper {
        TiltMapper::new(TiltConfig::default(), true, Vec2::new(0.0, 0.8))
    }

    mod on_orientation {
        use super::*;

        #[test]
        fn desktop_keeps_fixed_gravity() {
            let mut mapper = TiltMapper::new(TiltConfig::default(), false, Vec2::new(0.0, 0.8));
            let out = mapper.on_orientation(Orientation { pitch: 30.0, roll: 30.0 }).unwrap();
            assert_eq!(out, None);
            assert_eq!(mapper.gravity(), Vec2::new(0.0, 0.8));
        }

        #[test]
        fn smooths_instead_of_snapping() {
            let mut mapper = mobile();
            let g = mapper
                .on_orientation(Orientation { pitch: 0.0, roll: 45.0 })
                .unwrap()
                .unwrap();
            let target = mapper.target();
            assert_eq!(target, Vec2::new(0.5, 0.25));
            assert!((g.x - 0.5 * 0.15).abs() < 1e-6);
            assert!((g.y - (0.8 + (0.25 - 0.8) * 0.15)).abs() < 1e-6);
        }

        #[test]
        fn converges_on_steady_tilt() {
            let mut mapper = mobile();
            for _ in 0..200 {
                mapper.on_orientation(Orientation { pitch: -20.0, roll: -10.0 }).unwrap();
            }
            let delta = mapper.gravity() - mapper.target();
            assert!(delta.length() < 1e-4);
        }

        #[test]
        fn extreme_angles_stay_in_range() {
            let mut mapper = mobile();
            for (pitch, roll) in [(180.0, -180.0), (-90.0, 90.0), (f32::NAN, 1.0e9)] {
                mapper.on_orientation(Orientation { pitch, roll }).unwrap();
                let t = mapper.target();
                assert!((-0.5001..=0.5001).contains(&t.x), "{t:?}");
                assert!((-0.2001..=0.7001).contains(&t.y), "{t:?}");
            }
        }

        #[test]
        fn mode_toggle_smooths_from_gravity_in_effect() {
            let resting = Vec2::new(0.0, 0.8);
            let mut mapper = mobile();
            for _ in 0..100 {
                mapper.on_orientation(Orientation { pitch: 0.0, roll: 45.0 }).unwrap();
            }
            mapper.set_mobile(false, resting);
            mapper.set_mobile(true, resting);
            let g = mapper
                .on_orientation(Orientation { pitch: 0.0, roll: 0.0 })
                .unwrap()
                .unwrap();
            assert!(g.x.abs() < 1e-6, "{g:?}");
            assert!((g.y - 0.7175).abs() < 1e-5, "{g:?}");
        }

        #[test]
        fn disabled_mapper_reports_unavailable() {
            let mut mapper = mobile();
            mapper.disable();
            assert!(!mapper.is_active());
            let err = mapper.on_orientation(Orientation { pitch: 0.0, roll: 0.0 }).unwrap_err();
            assert!(matches!(err, EngineError::SensorUnavailable(_)));
        }
    }
}
