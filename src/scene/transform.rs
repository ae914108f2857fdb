//! Local and world transforms (f64)

use std::ops::Mul;

use bevy::math::{DAffine3, DQuat, DVec3};

/// Translation, rotation and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.scale = scale;
        self
    }

    /// Scale, then rotate, then translate.
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A node's transform relative to the root of its tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform(DAffine3);

impl Default for WorldTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl WorldTransform {
    pub const IDENTITY: Self = Self(DAffine3::IDENTITY);

    pub fn affine(&self) -> DAffine3 {
        self.0
    }

    pub fn translation(&self) -> DVec3 {
        self.0.translation
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.0.transform_point3(point)
    }

    /// Applies rotation and scale only.
    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.0.transform_vector3(vector)
    }
}

impl From<LocalTransform> for WorldTransform {
    fn from(local: LocalTransform) -> Self {
        Self(local.to_affine())
    }
}

impl Mul<LocalTransform> for WorldTransform {
    type Output = WorldTransform;

    /// Child world transform from this (parent) world transform.
    fn mul(self, child: LocalTransform) -> WorldTransform {
        WorldTransform(self.0 * child.to_affine())
    }
}
