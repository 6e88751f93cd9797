//! # Math Primitives
//!
//! Minimal 3D vector type plus the handful of planar helpers the
//! targeting resolver needs. Gameplay geometry is effectively 2D (the Z
//! axis only participates in height gating), so most helpers operate on
//! the XY projection.

use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// ============================================================================
// Vec3
// ============================================================================

/// World-space position or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const X_AXIS: Vec3 = Vec3 { x: 1.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    pub fn length(self) -> f32 {
        sqrt(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Length of the XY projection.
    pub fn length2d(self) -> f32 {
        sqrt(self.x * self.x + self.y * self.y)
    }

    pub fn length_sq2d(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn distance2d(self, other: Vec3) -> f32 {
        (other - self).length2d()
    }

    pub fn distance_sq2d(self, other: Vec3) -> f32 {
        (other - self).length_sq2d()
    }

    pub fn dot2d(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Counter-clockwise perpendicular of the XY projection (Z dropped).
    pub fn perp2d(self) -> Vec3 {
        Vec3::new(-self.y, self.x, 0.0)
    }

    /// XY projection normalized to unit length. Falls back to the X axis
    /// for degenerate inputs so callers always get a usable direction.
    pub fn normalized2d(self) -> Vec3 {
        let len = self.length2d();
        if len <= f32::EPSILON {
            Vec3::X_AXIS
        } else {
            Vec3::new(self.x / len, self.y / len, 0.0)
        }
    }

    /// Rotate the XY projection by `radians` (counter-clockwise).
    pub fn rotated2d(self, radians: f32) -> Vec3 {
        let (sin, cos) = sin_cos(radians);
        Vec3::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos, self.z)
    }

    /// Unsigned angle in radians between the XY projections, in `[0, pi]`.
    pub fn angle2d(self, other: Vec3) -> f32 {
        let denom = self.length2d() * other.length2d();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        acos((self.dot2d(other) / denom).clamp(-1.0, 1.0))
    }

    /// Copy with Z forced to zero.
    pub fn flattened(self) -> Vec3 {
        Vec3::new(self.x, self.y, 0.0)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Scalar Helpers
// ============================================================================

pub const PI: f32 = core::f32::consts::PI;

pub fn to_radians(degrees: f32) -> f32 {
    degrees * (PI / 180.0)
}

#[cfg(feature = "std")]
#[inline]
pub fn sqrt(v: f32) -> f32 {
    v.sqrt()
}

#[cfg(feature = "std")]
#[inline]
pub fn acos(v: f32) -> f32 {
    v.acos()
}

#[cfg(feature = "std")]
#[inline]
pub fn asin(v: f32) -> f32 {
    v.asin()
}

#[cfg(feature = "std")]
#[inline]
pub fn sin_cos(v: f32) -> (f32, f32) {
    v.sin_cos()
}

#[cfg(feature = "std")]
#[inline]
pub fn abs(v: f32) -> f32 {
    v.abs()
}

// no_std builds use libm so the same bits come out on every platform
#[cfg(not(feature = "std"))]
#[inline]
pub fn sqrt(v: f32) -> f32 {
    libm::sqrtf(v)
}

#[cfg(not(feature = "std"))]
#[inline]
pub fn acos(v: f32) -> f32 {
    libm::acosf(v)
}

#[cfg(not(feature = "std"))]
#[inline]
pub fn asin(v: f32) -> f32 {
    libm::asinf(v)
}

#[cfg(not(feature = "std"))]
#[inline]
pub fn sin_cos(v: f32) -> (f32, f32) {
    (libm::sinf(v), libm::cosf(v))
}

#[cfg(not(feature = "std"))]
#[inline]
pub fn abs(v: f32) -> f32 {
    libm::fabsf(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perp_is_counter_clockwise() {
        let v = Vec3::new(1.0, 0.0, 0.0);
        let p = v.perp2d();
        assert!((p.x - 0.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn angle_between_orthogonal_vectors() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 5.0, 0.0);
        assert!((a.angle2d(b) - PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_normalize_falls_back_to_x_axis() {
        assert_eq!(Vec3::ZERO.normalized2d(), Vec3::X_AXIS);
    }

    #[test]
    fn rotation_preserves_length() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let r = v.rotated2d(1.234);
        assert!((r.length2d() - 5.0).abs() < 1e-4);
    }
}
