//! Pose math types shared by trackers, nodes and collectors.
//!
//! These are the canonical representations carried in telemetry envelopes.
//! Component order matches the wire: `x, y, z` for positions and
//! `x, y, z, w` for orientations.

use bytemuck::{Pod, Zeroable};

/// 3D Vector - tracked position in meters
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array in `x, y, z` order
    #[inline]
    #[must_use]
    pub fn to_array(self) -> [f32; 3] {
        bytemuck::cast(self)
    }

    /// Creates from an `x, y, z` array
    #[inline]
    #[must_use]
    pub fn from_array(arr: [f32; 3]) -> Self {
        bytemuck::cast(arr)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Quaternion for orientations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Converts to array in `x, y, z, w` order
    #[inline]
    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        bytemuck::cast(self)
    }

    /// Creates from an `x, y, z, w` array
    #[inline]
    #[must_use]
    pub fn from_array(arr: [f32; 4]) -> Self {
        bytemuck::cast(arr)
    }

    /// Rotation of `angle` radians about the vertical (Y) axis.
    #[must_use]
    pub fn from_yaw(angle: f32) -> Self {
        let half = angle * 0.5;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 7.0);
        assert_eq!(sum.z, 9.0);

        assert_eq!((b - a) * 2.0, Vec3::new(6.0, 6.0, 6.0));
    }

    #[test]
    fn test_array_views_follow_wire_order() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(Vec3::from_array([1.0, 2.0, 3.0]), v);

        let q = Quaternion::new(0.1, 0.2, 0.3, 0.9);
        assert_eq!(q.to_array(), [0.1, 0.2, 0.3, 0.9]);
        assert_eq!(Quaternion::from_array(q.to_array()), q);
    }

    #[test]
    fn test_quaternion_defaults() {
        assert_eq!(Quaternion::default(), Quaternion::IDENTITY);
        assert_eq!(Quaternion::from_yaw(0.0), Quaternion::IDENTITY);

        let q = Quaternion::from_array([0.1, 0.2, 0.3, 0.9]);
        assert_eq!(q.to_array(), [0.1, 0.2, 0.3, 0.9]);
    }

    #[test]
    fn test_yaw_is_unit_length() {
        let q = Quaternion::from_yaw(1.3);
        let norm = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
