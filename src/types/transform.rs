//! Transform types for block and element rotations.

use super::Axis;
use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Block-level transform from blockstate variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockTransform {
    /// X rotation in degrees (0, 90, 180, 270), if the variant declared one.
    pub x: Option<i32>,
    /// Y rotation in degrees (0, 90, 180, 270), if the variant declared one.
    pub y: Option<i32>,
    /// If true, UV coordinates don't rotate with the block.
    pub uvlock: bool,
}

impl BlockTransform {
    pub fn new(x: Option<i32>, y: Option<i32>, uvlock: bool) -> Self {
        Self { x, y, uvlock }
    }

    /// Check if this is an identity transform (no rotation).
    pub fn is_identity(&self) -> bool {
        self.x.unwrap_or(0) == 0 && self.y.unwrap_or(0) == 0
    }

    /// Euler rotation (degrees, XYZ order) applied to the built model object.
    ///
    /// When the variant has no `x`, the Y angle is applied as `360 - y`;
    /// with an `x` it is applied as-is. The in-game direction of Y rotation in
    /// combination with X has not been verified against the client.
    pub fn euler_degrees(&self) -> [f32; 3] {
        let x = self.x.map(|x| x as f32).unwrap_or(0.0);
        let y = match (self.x, self.y) {
            (Some(_), Some(y)) => y as f32,
            (None, Some(y)) => 360.0 - y as f32,
            (_, None) => 0.0,
        };
        [x, y, 0.0]
    }

    /// Rotation as a quaternion built from [`Self::euler_degrees`].
    pub fn rotation(&self) -> Quat {
        let [x, y, z] = self.euler_degrees();
        Quat::from_euler(EulerRot::XYZ, x.to_radians(), y.to_radians(), z.to_radians())
    }

    /// Rotation as a matrix around the block center.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation())
    }
}

/// Element-level rotation from model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRotation {
    /// Origin point for rotation (in 0-16 Minecraft coordinates).
    #[serde(default = "default_origin")]
    pub origin: [f32; 3],
    /// Axis to rotate around.
    pub axis: Axis,
    /// Rotation angle in degrees (-45 to 45, in 22.5 increments).
    pub angle: f32,
    /// Whether to rescale the element after rotation.
    #[serde(default)]
    pub rescale: bool,
}

fn default_origin() -> [f32; 3] {
    [8.0, 8.0, 8.0]
}

impl ElementRotation {
    /// Get the angle in radians.
    pub fn angle_radians(&self) -> f32 {
        self.angle.to_radians()
    }

    /// Get the rescale factor for this rotation.
    /// When rescale is true, the element is scaled to maintain its original size.
    pub fn rescale_factor(&self) -> f32 {
        if self.rescale {
            1.0 / self.angle_radians().cos()
        } else {
            1.0
        }
    }

    /// Apply this rotation to a point in 0-16 model space.
    pub fn apply(&self, point: [f32; 3]) -> [f32; 3] {
        let origin = Vec3::from(self.origin);
        let axis = Vec3::from(self.axis.unit_vector());
        let rotation = Quat::from_axis_angle(axis, self.angle_radians());

        let mut local = Vec3::from(point) - origin;
        if self.rescale {
            // Stretch the two axes perpendicular to the rotation axis.
            let factor = self.rescale_factor();
            let stretch = Vec3::ONE + (Vec3::ONE - axis) * (factor - 1.0);
            local *= stretch;
        }
        (rotation * local + origin).into()
    }

    /// Apply this rotation to a normal vector.
    pub fn apply_normal(&self, normal: [f32; 3]) -> [f32; 3] {
        let axis = Vec3::from(self.axis.unit_vector());
        let rotation = Quat::from_axis_angle(axis, self.angle_radians());
        (rotation * Vec3::from(normal)).into()
    }
}
