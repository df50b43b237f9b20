use crate::{
    config::{self, Material, PhysicsConfig},
    spatial::SpatialHash,
    types::{BodyId, Size, Vec2},
};

/// Approach speeds below this settle instead of bouncing.
const REST_SPEED: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct Body {
    pub id: BodyId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32,
    pub angular_vel: f32,
    pub radius: f32,
    pub material: Material,
    /// Accumulated since the last step, cleared by it.
    pub force: Vec2,
    inv_mass: f32,
}

/// Static box the charms bounce off.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boundary {
    pub min: Vec2,
    pub max: Vec2,
}

impl Boundary {
    /// The four walls whose inner faces sit exactly on the container edges.
    pub fn enclosing(size: Size, thickness: f32) -> [Boundary; 4] {
        let (w, h, t) = (size.width, size.height, thickness);
        [
            Boundary {
                min: Vec2::new(-t, -t),
                max: Vec2::new(w + t, 0.0),
            },
            Boundary {
                min: Vec2::new(-t, h),
                max: Vec2::new(w + t, h + t),
            },
            Boundary {
                min: Vec2::new(-t, -t),
                max: Vec2::new(0.0, h + t),
            },
            Boundary {
                min: Vec2::new(w, -t),
                max: Vec2::new(w + t, h + t),
            },
        ]
    }

    fn contact(&self, pos: Vec2, radius: f32) -> Option<(Vec2, f32)> {
        let closest = Vec2::new(
            pos.x.clamp(self.min.x, self.max.x),
            pos.y.clamp(self.min.y, self.max.y),
        );
        let delta = pos - closest;
        let dist_sq = delta.length_sq();
        if dist_sq > 0.0 {
            if dist_sq >= radius * radius {
                return None;
            }
            let dist = dist_sq.sqrt();
            return Some((delta * (1.0 / dist), radius - dist));
        }
        // Center inside the box: leave through the nearest face.
        let exits = [
            (pos.x - self.min.x, Vec2::new(-1.0, 0.0)),
            (self.max.x - pos.x, Vec2::new(1.0, 0.0)),
            (pos.y - self.min.y, Vec2::new(0.0, -1.0)),
            (self.max.y - pos.y, Vec2::new(0.0, 1.0)),
        ];
        exits
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(depth, normal)| (normal, depth + radius))
    }
}

/// Circle-only rigid body world. One call to [`PhysicsWorld::step`] advances
/// one display frame; velocities are in pixels per frame.
pub struct PhysicsWorld {
    bodies: Vec<Body>,
    boundaries: Vec<Boundary>,
    pub gravity: Vec2,
    gravity_scale: f32,
    iterations: usize,
    spatial: SpatialHash,
    neighbors: Vec<usize>,
    next_id: BodyId,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            bodies: Vec::new(),
            boundaries: Vec::new(),
            gravity: config.gravity(),
            gravity_scale: config.gravity_scale,
            iterations: config.solver_iterations.max(1),
            spatial: SpatialHash::new(config::SPATIAL_CELL_SIZE),
            neighbors: Vec::new(),
            next_id: 1,
        }
    }

    #[cfg(test)]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    #[cfg(test)]
    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    pub fn add_circle(&mut self, pos: Vec2, radius: f32, material: Material) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;
        let mass = material.density * std::f32::consts::PI * radius * radius;
        self.bodies.push(Body {
            id,
            pos,
            vel: Vec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
            radius,
            material,
            force: Vec2::ZERO,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
        });
        id
    }

    pub fn remove_body(&mut self, id: BodyId) -> bool {
        let before = self.bodies.len();
        self.bodies.retain(|b| b.id != id);
        self.bodies.len() != before
    }

    pub fn set_boundaries(&mut self, boundaries: &[Boundary]) {
        self.boundaries.clear();
        self.boundaries.extend_from_slice(boundaries);
    }

    pub fn clear_boundaries(&mut self) {
        self.boundaries.clear();
    }

    /// Adds a force for the next step; returns false for unknown ids.
    pub fn apply_force(&mut self, id: BodyId, force: Vec2) -> bool {
        match self.body_mut(id) {
            Some(body) => {
                body.force += force;
                true
            }
            None => false,
        }
    }

    /// Instant velocity change, independent of mass.
    pub fn apply_impulse(&mut self, id: BodyId, delta_v: Vec2, spin: f32) -> bool {
        match self.body_mut(id) {
            Some(body) => {
                body.vel += delta_v;
                body.angular_vel += spin;
                true
            }
            None => false,
        }
    }

    pub fn step(&mut self) {
        let gravity = self.gravity * self.gravity_scale;
        for body in &mut self.bodies {
            let damping = 1.0 - body.material.air_friction;
            body.vel = body.vel * damping + gravity + body.force * body.inv_mass;
            body.pos += body.vel;
            body.angular_vel *= damping;
            body.angle += body.angular_vel;
            body.force = Vec2::ZERO;
        }

        self.spatial
            .rebuild(self.bodies.iter().map(|b| (b.pos, b.radius)));
        for _ in 0..self.iterations {
            self.resolve_pairs();
            self.resolve_boundaries();
        }
    }

    fn resolve_pairs(&mut self) {
        for i in 0..self.bodies.len() {
            let (pos, radius) = (self.bodies[i].pos, self.bodies[i].radius);
            self.spatial.query(pos, radius, &mut self.neighbors);
            for &j in &self.neighbors {
                if j <= i {
                    continue;
                }
                let (left, right) = self.bodies.split_at_mut(j);
                resolve_pair(&mut left[i], &mut right[0]);
            }
        }
    }

    fn resolve_boundaries(&mut self) {
        for body in &mut self.bodies {
            for wall in &self.boundaries {
                if let Some((normal, depth)) = wall.contact(body.pos, body.radius) {
                    body.pos += normal * depth;
                    bounce_off_static(body, normal);
                }
            }
        }
    }
}

fn resolve_pair(a: &mut Body, b: &mut Body) {
    let delta = b.pos - a.pos;
    let dist = delta.length();
    let min_dist = a.radius + b.radius;
    if dist >= min_dist {
        return;
    }
    let inv_sum = a.inv_mass + b.inv_mass;
    if inv_sum <= 0.0 {
        return;
    }
    let normal = if dist > 0.0 {
        delta * (1.0 / dist)
    } else {
        Vec2::new(1.0, 0.0)
    };
    let overlap = min_dist - dist;
    a.pos -= normal * (overlap * a.inv_mass / inv_sum);
    b.pos += normal * (overlap * b.inv_mass / inv_sum);

    let rel_along = (b.vel - a.vel).dot(normal);
    if rel_along >= 0.0 {
        return;
    }
    let restitution = if -rel_along < REST_SPEED {
        0.0
    } else {
        a.material.restitution.max(b.material.restitution)
    };
    let jn = -(1.0 + restitution) * rel_along / inv_sum;
    a.vel -= normal * (jn * a.inv_mass);
    b.vel += normal * (jn * b.inv_mass);

    // Coulomb friction at the contact point; this is what makes charms spin.
    let tangent = normal.perp();
    let contact_a = a.vel + tangent * (a.angular_vel * a.radius);
    let contact_b = b.vel - tangent * (b.angular_vel * b.radius);
    let vt = (contact_b - contact_a).dot(tangent);
    let friction = a.material.friction.min(b.material.friction);
    let jt = (-vt / (3.0 * inv_sum)).clamp(-friction * jn, friction * jn);
    a.vel -= tangent * (jt * a.inv_mass);
    b.vel += tangent * (jt * b.inv_mass);
    a.angular_vel -= 2.0 * jt * a.inv_mass / a.radius;
    b.angular_vel -= 2.0 * jt * b.inv_mass / b.radius;
}

fn bounce_off_static(body: &mut Body, normal: Vec2) {
    let vn = body.vel.dot(normal);
    if vn >= 0.0 {
        return;
    }
    let restitution = if -vn < REST_SPEED {
        0.0
    } else {
        body.material.restitution
    };
    let dvn = -(1.0 + restitution) * vn;
    body.vel += normal * dvn;

    let tangent = normal.perp();
    let vt = body.vel.dot(tangent) - body.angular_vel * body.radius;
    let limit = body.material.friction * dvn;
    let dvt = (-vt / 3.0).clamp(-limit, limit);
    body.vel += tangent * dvt;
    body.angular_vel -= 2.0 * dvt / body.radius;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig::default())
    }

    fn boxed_world(size: Size) -> PhysicsWorld {
        let mut world = world();
        world.set_boundaries(&Boundary::enclosing(size, config::WALL_THICKNESS));
        world
    }

    mod boundary_enclosing {
        use super::*;

        #[test]
        fn inner_faces_match_container_edges() {
            let walls = Boundary::enclosing(Size::new(400.0, 300.0), 50.0);
            assert_eq!(walls[0].max.y, 0.0);
            assert_eq!(walls[1].min.y, 300.0);
            assert_eq!(walls[2].max.x, 0.0);
            assert_eq!(walls[3].min.x, 400.0);
        }

        #[test]
        fn contact_reports_penetration_depth() {
            let floor = Boundary::enclosing(Size::new(400.0, 300.0), 50.0)[1];
            let (normal, depth) = floor.contact(Vec2::new(200.0, 295.0), 10.0).unwrap();
            assert_eq!(normal, Vec2::new(0.0, -1.0));
            assert!((depth - 5.0).abs() < 1e-4);
            assert!(floor.contact(Vec2::new(200.0, 280.0), 10.0).is_none());
        }

        #[test]
        fn buried_center_exits_through_nearest_face() {
            let floor = Boundary::enclosing(Size::new(400.0, 300.0), 50.0)[1];
            let (normal, depth) = floor.contact(Vec2::new(200.0, 302.0), 10.0).unwrap();
            assert_eq!(normal, Vec2::new(0.0, -1.0));
            assert!((depth - 12.0).abs() < 1e-4);
        }
    }

    mod step {
        use super::*;

        #[test]
        fn gravity_accelerates_downward() {
            let mut world = world();
            let id = world.add_circle(Vec2::new(100.0, 100.0), 15.0, Material::default());
            world.step();
            let body = world.body(id).unwrap();
            assert!(body.vel.y > 0.0);
            assert!(body.pos.y > 100.0);
        }

        #[test]
        fn force_is_consumed_by_step() {
            let mut world = world();
            world.gravity = Vec2::ZERO;
            let id = world.add_circle(Vec2::new(100.0, 100.0), 15.0, Material::default());
            assert!(world.apply_force(id, Vec2::new(0.02, 0.0)));
            world.step();
            let body = world.body(id).unwrap();
            assert!(body.vel.x > 0.0);
            assert_eq!(body.force, Vec2::ZERO);
        }

        #[test]
        fn overlapping_circles_are_separated() {
            let mut world = world();
            world.gravity = Vec2::ZERO;
            let a = world.add_circle(Vec2::new(100.0, 100.0), 15.0, Material::default());
            let b = world.add_circle(Vec2::new(110.0, 100.0), 15.0, Material::default());
            world.step();
            let pa = world.body(a).unwrap().pos;
            let pb = world.body(b).unwrap().pos;
            assert!((pb - pa).length() >= 30.0 - 1e-3);
        }

        #[test]
        fn fast_body_stays_inside_walls() {
            let size = Size::new(400.0, 300.0);
            let mut world = boxed_world(size);
            let id = world.add_circle(Vec2::new(380.0, 150.0), 15.0, Material::default());
            world.apply_impulse(id, Vec2::new(20.0, 0.0), 0.0);
            world.step();
            let body = world.body(id).unwrap();
            assert!(body.pos.x <= size.width - body.radius + 1e-3);
            assert!(body.vel.x < 0.0, "should bounce back, got {:?}", body.vel);
        }

        #[test]
        fn resting_body_does_not_sink_through_floor() {
            let size = Size::new(400.0, 300.0);
            let mut world = boxed_world(size);
            let id = world.add_circle(Vec2::new(200.0, 250.0), 20.0, Material::default());
            for _ in 0..600 {
                world.step();
            }
            let body = world.body(id).unwrap();
            assert!(body.pos.y <= size.height - body.radius + 0.5);
            assert!(body.vel.length() < 1.0);
        }

        #[test]
        fn sliding_contact_spins_the_body() {
            let size = Size::new(400.0, 300.0);
            let mut world = boxed_world(size);
            let id = world.add_circle(Vec2::new(200.0, 280.0), 20.0, Material::default());
            world.apply_impulse(id, Vec2::new(6.0, 3.0), 0.0);
            world.step();
            assert!(world.body(id).unwrap().angular_vel != 0.0);
        }
    }

    mod bookkeeping {
        use super::*;

        #[test]
        fn ids_are_unique_and_removable() {
            let mut world = world();
            let a = world.add_circle(Vec2::ZERO, 12.0, Material::default());
            let b = world.add_circle(Vec2::ZERO, 12.0, Material::default());
            assert_ne!(a, b);
            assert!(world.remove_body(a));
            assert!(!world.remove_body(a));
            assert!(world.body(b).is_some());
            assert!(!world.apply_impulse(a, Vec2::new(1.0, 0.0), 0.0));
        }

        #[test]
        fn mass_follows_density_and_area() {
            let mut world = world();
            let material = Material::default();
            let id = world.add_circle(Vec2::ZERO, 10.0, material);
            let expected = material.density * std::f32::consts::PI * 100.0;
            let mass = 1.0 / world.body(id).unwrap().inv_mass;
            assert!((mass - expected).abs() < 1e-6);
        }
    }
}
