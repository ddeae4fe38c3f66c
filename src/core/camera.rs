//! Viewer camera and the visibility tests the world and optimizer use

use crate::core::types::{Quat, Vec3};
use crate::voxel::voxel::{Face, VoxelRecord};

/// Bounding radius of a voxel: half its diagonal (sqrt 3 for a side of 2),
/// rounded up to 1.75
const VOXEL_RADIUS: f32 = 1.75;

/// Camera with position, rotation and view cone
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Nothing beyond this distance is visible
    pub far: f32,
}

impl Camera {
    /// Create a new camera looking down -Z
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            far: 1000.0,
        }
    }

    /// Create camera looking at a target
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        let rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));

        Self {
            rotation,
            ..Self::new(position, 60.0, 16.0 / 9.0)
        }
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Set rotation from euler angles (yaw, pitch in radians)
    pub fn set_rotation_euler(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0);
    }

    /// Half-angle of a cone enclosing the view frustum
    pub fn half_cone(&self) -> f32 {
        let half_y = self.fov_y * 0.5;
        let half_x = (half_y.tan() * self.aspect).atan();
        half_x.max(half_y)
    }

    /// Faces that can point at the camera for some voxel in view.
    ///
    /// Face `j` can be seen from inside the view cone only if its normal is
    /// not within `90° - half_cone` of the view direction.
    pub fn facing_mask(&self) -> u8 {
        let forward = self.forward();
        let limit = self.half_cone().sin();
        Face::ALL
            .iter()
            .filter(|face| face.normal().dot(forward) < limit)
            .fold(0, |mask, face| mask | face.bit())
    }

    /// Cone and distance test for a position
    pub fn can_see(&self, pos: Vec3) -> bool {
        let to = pos - self.position;
        let dist = to.length();
        if dist <= VOXEL_RADIUS {
            return true;
        }
        if dist > self.far + VOXEL_RADIUS {
            return false;
        }
        let angle = to.dot(self.forward()) / dist;
        let slack = (VOXEL_RADIUS / dist).asin();
        angle >= (self.half_cone() + slack).min(std::f32::consts::PI).cos()
    }

    /// Visibility predicate for a voxel
    pub fn can_see_voxel(&self, record: &VoxelRecord) -> bool {
        self.can_see(record.position)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5.0), 60.0, 16.0 / 9.0)
    }
}
