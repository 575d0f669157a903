use nalgebra::{UnitQuaternion, Vector3};

pub const UP: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

/// Expresses a body frame vector in world axes.
/// `orientation` is the attitude of the body in the world frame.
pub fn body_to_world(orientation: &UnitQuaternion<f32>, body: &Vector3<f32>) -> Vector3<f32> {
    orientation.transform_vector(body)
}

/// Component of a body frame vector along world up.
pub fn vertical_component(orientation: &UnitQuaternion<f32>, body: &Vector3<f32>) -> f32 {
    body_to_world(orientation, body).dot(&UP)
}

/// Angle between the rocket's long axis (body z) and world up, rad
pub fn tilt(orientation: &UnitQuaternion<f32>) -> f32 {
    UP.angle(&body_to_world(orientation, &UP))
}
