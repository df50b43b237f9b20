use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn normalize(self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    pub fn rotate(self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn lerp(self, target: Vec2, t: f32) -> Vec2 {
        self + (target - self) * t
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned container size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

pub type BodyId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Linear blend toward `other`; `t = 0` keeps `self`.
    pub fn mix(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let ch = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb(ch(self.0, other.0), ch(self.1, other.1), ch(self.2, other.2))
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(format!("expected #RRGGBB, got {s:?}"));
        }
        u32::from_str_radix(digits, 16)
            .map(Rgb::hex)
            .map_err(|e| format!("bad color {s:?}: {e}"))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// A charm color as configured: a fixed color, or the per-glyph pastel cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ColorChoice {
    Solid(Rgb),
    Rainbow,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("rainbow") {
            Ok(ColorChoice::Rainbow)
        } else {
            s.trim().parse().map(ColorChoice::Solid)
        }
    }
}

impl TryFrom<String> for ColorChoice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorChoice::Solid(rgb) => rgb.fmt(f),
            ColorChoice::Rainbow => f.write_str("rainbow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod vec2_length {
        use super::*;

        #[test]
        fn calculates_length() {
            let v = Vec2::new(3.0, 4.0);
            assert_eq!(v.length_sq(), 25.0);
            assert_eq!(v.length(), 5.0);
        }

        #[test]
        fn zero_vector_normalizes_to_zero() {
            assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        }
    }

    mod vec2_rotate {
        use super::*;

        #[test]
        fn quarter_turn_maps_x_onto_y() {
            let v = Vec2::new(1.0, 0.0).rotate(std::f32::consts::FRAC_PI_2);
            assert!(v.x.abs() < 1e-6);
            assert!((v.y - 1.0).abs() < 1e-6);
        }

        #[test]
        fn perp_is_orthogonal() {
            let v = Vec2::new(2.0, 5.0);
            assert_eq!(v.dot(v.perp()), 0.0);
        }

        #[test]
        fn from_angle_is_unit_length() {
            let v = Vec2::from_angle(1.234);
            assert!((v.length() - 1.0).abs() < 1e-6);
        }
    }

    mod vec2_lerp {
        use super::*;

        #[test]
        fn moves_fraction_of_the_way() {
            let v = Vec2::ZERO.lerp(Vec2::new(10.0, -20.0), 0.25);
            assert_eq!(v, Vec2::new(2.5, -5.0));
        }
    }

    mod size {
        use super::*;

        #[test]
        fn zero_side_is_empty() {
            assert!(Size::new(0.0, 300.0).is_empty());
            assert!(Size::new(400.0, 0.0).is_empty());
            assert!(!Size::new(400.0, 300.0).is_empty());
        }

        #[test]
        fn nan_side_is_empty() {
            assert!(Size::new(f32::NAN, 300.0).is_empty());
        }
    }

    mod rgb_parse {
        use super::*;

        #[test]
        fn parses_hash_prefixed_hex() {
            assert_eq!("#4A90E2".parse::<Rgb>(), Ok(Rgb(0x4A, 0x90, 0xE2)));
        }

        #[test]
        fn rejects_short_strings() {
            assert!("#FFF".parse::<Rgb>().is_err());
        }

        #[test]
        fn display_round_trips() {
            let rgb = Rgb::hex(0xFFB3BA);
            assert_eq!(rgb.to_string(), "#FFB3BA");
        }

        #[test]
        fn mix_endpoints() {
            let a = Rgb(0, 0, 0);
            let b = Rgb(200, 100, 50);
            assert_eq!(a.mix(b, 0.0), a);
            assert_eq!(a.mix(b, 1.0), b);
            assert_eq!(a.mix(b, 0.5), Rgb(100, 50, 25));
        }
    }

    mod color_choice {
        use super::*;

        #[test]
        fn rainbow_is_case_insensitive() {
            assert_eq!("Rainbow".parse::<ColorChoice>(), Ok(ColorChoice::Rainbow));
        }

        #[test]
        fn hex_becomes_solid() {
            assert_eq!(
                "#A8E6CF".parse::<ColorChoice>(),
                Ok(ColorChoice::Solid(Rgb::hex(0xA8E6CF)))
            );
        }

        #[test]
        fn deserializes_from_json_string() {
            let choice: ColorChoice = serde_json::from_str("\"rainbow\"").unwrap();
            assert_eq!(choice, ColorChoice::Rainbow);
        }
    }
}
