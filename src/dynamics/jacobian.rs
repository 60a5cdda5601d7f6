//! Joint jacobians built by the narrow phase for the external solver.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_JOINT_BIAS_FACTOR;
use crate::core::constraints::{BodyIndexPair, Joint, JointData};
use crate::core::rigidbody::{MotionData, MotionVelocity};
use crate::core::types::Transform;

/// One scalar constraint `J * v` over the velocities of bodies A and B.
///
/// `error` is the current position-level value of the constraint, which the
/// solver keeps inside `[min_error, max_error]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JacobianRow {
    pub linear_a: Vec3,
    pub angular_a: Vec3,
    pub linear_b: Vec3,
    pub angular_b: Vec3,
    pub error: f32,
    pub min_error: f32,
    pub max_error: f32,
}

impl JacobianRow {
    fn linear(axis: Vec3, arm_a: Vec3, arm_b: Vec3, error: f32, min_error: f32, max_error: f32) -> Self {
        Self {
            linear_a: axis,
            angular_a: arm_a.cross(axis),
            linear_b: -axis,
            angular_b: -arm_b.cross(axis),
            error,
            min_error,
            max_error,
        }
    }

    fn angular(axis: Vec3, error: f32) -> Self {
        Self {
            linear_a: Vec3::ZERO,
            angular_a: axis,
            linear_b: Vec3::ZERO,
            angular_b: -axis,
            error,
            min_error: 0.0,
            max_error: 0.0,
        }
    }

    /// Rate of change of the constraint for the given body velocities.
    pub fn relative_velocity(&self, a: &MotionVelocity, b: &MotionVelocity) -> f32 {
        self.linear_a.dot(a.linear)
            + self.angular_a.dot(a.angular)
            + self.linear_b.dot(b.linear)
            + self.angular_b.dot(b.angular)
    }

    /// Amount by which `error` leaves its allowed range (zero inside it).
    pub fn violation(&self) -> f32 {
        self.error - self.error.clamp(self.min_error, self.max_error)
    }

    /// Target velocity that removes `bias_factor` of the violation per step.
    pub fn bias_velocity(&self, bias_factor: f32, time_step: f32) -> f32 {
        if time_step <= 0.0 {
            return 0.0;
        }
        -self.violation() * bias_factor / time_step
    }

    pub fn default_bias_velocity(&self, time_step: f32) -> f32 {
        self.bias_velocity(DEFAULT_JOINT_BIAS_FACTOR, time_step)
    }
}

/// Linearised joint between two bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointJacobian {
    /// The joint's own body order, which may differ from the dispatch pair.
    pub body_pair: BodyIndexPair,
    pub joint_index: usize,
    pub rows: Vec<JacobianRow>,
}

impl JointJacobian {
    /// Builds the rows of `joint` from the bodies' current motion frames.
    pub fn build(joint: &Joint, joint_index: usize, motion_a: &MotionData, motion_b: &MotionData) -> Self {
        let world_from_a = world_from_body(motion_a);
        let world_from_b = world_from_body(motion_b);
        let center_a = motion_a.world_from_motion.position;
        let center_b = motion_b.world_from_motion.position;

        let rows = match joint.data {
            JointData::BallAndSocket { pivot_a, pivot_b } => {
                let pa = world_from_a.transform_point(pivot_a);
                let pb = world_from_b.transform_point(pivot_b);
                point_rows(pa - center_a, pb - center_b, pa - pb).to_vec()
            }
            JointData::LimitedDistance {
                pivot_a,
                pivot_b,
                min_distance,
                max_distance,
            } => {
                let pa = world_from_a.transform_point(pivot_a);
                let pb = world_from_b.transform_point(pivot_b);
                let delta = pa - pb;
                let length = delta.length();
                let axis = delta.try_normalize().unwrap_or(Vec3::X);
                vec![JacobianRow::linear(
                    axis,
                    pa - center_a,
                    pb - center_b,
                    length,
                    min_distance,
                    max_distance,
                )]
            }
            JointData::Fixed {
                body_a_from_joint,
                body_b_from_joint,
            } => {
                let joint_a = world_from_a.combine(&body_a_from_joint);
                let joint_b = world_from_b.combine(&body_b_from_joint);
                let mut rows = point_rows(
                    joint_a.position - center_a,
                    joint_b.position - center_b,
                    joint_a.position - joint_b.position,
                )
                .to_vec();

                let error_rotation = (joint_a.rotation * joint_b.rotation.conjugate()).normalize();
                let error_rotation = if error_rotation.w < 0.0 {
                    -error_rotation
                } else {
                    error_rotation
                };
                let (axis, angle) = error_rotation.to_axis_angle();
                let rotation_error = axis * angle;
                rows.extend(
                    [Vec3::X, Vec3::Y, Vec3::Z]
                        .into_iter()
                        .map(|axis| JacobianRow::angular(axis, rotation_error.dot(axis))),
                );
                rows
            }
        };

        Self {
            body_pair: joint.body_pair,
            joint_index,
            rows,
        }
    }
}

fn world_from_body(motion: &MotionData) -> Transform {
    motion
        .world_from_motion
        .combine(&motion.body_from_motion.inverse())
}

fn point_rows(arm_a: Vec3, arm_b: Vec3, separation: Vec3) -> [JacobianRow; 3] {
    [Vec3::X, Vec3::Y, Vec3::Z]
        .map(|axis| JacobianRow::linear(axis, arm_a, arm_b, separation.dot(axis), 0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn stationary(position: Vec3) -> MotionData {
        MotionData::stationary(Transform::from_position(position))
    }

    #[test]
    fn ball_and_socket_measures_pivot_gap() {
        let joint = Joint::ball_and_socket(BodyIndexPair::new(0, 1), Vec3::X, Vec3::ZERO);
        let jacobian = JointJacobian::build(&joint, 3, &stationary(Vec3::ZERO), &stationary(Vec3::new(1.5, 0.0, 0.0)));
        assert_eq!(jacobian.rows.len(), 3);
        assert_eq!(jacobian.joint_index, 3);
        assert_relative_eq!(jacobian.rows[0].error, -0.5, epsilon = 1e-6);
        assert_relative_eq!(jacobian.rows[0].violation(), -0.5, epsilon = 1e-6);
        assert!(jacobian.rows[0].bias_velocity(0.2, 0.1) > 0.0);
        assert_relative_eq!(jacobian.rows[0].default_bias_velocity(0.1), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn rigid_rotation_has_zero_rate() {
        let joint = Joint::ball_and_socket(BodyIndexPair::new(0, 1), Vec3::X, Vec3::ZERO);
        let jacobian = JointJacobian::build(&joint, 0, &stationary(Vec3::ZERO), &stationary(Vec3::X));
        // Both bodies spin together about A's origin.
        let omega = Vec3::new(0.0, 0.0, 2.0);
        let a = MotionVelocity::ZERO.with_velocity(Vec3::ZERO, omega);
        let b = MotionVelocity::ZERO.with_velocity(omega.cross(Vec3::X), omega);
        for row in &jacobian.rows {
            assert_relative_eq!(row.relative_velocity(&a, &b), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn limited_distance_inside_range_is_satisfied() {
        let joint = Joint::limited_distance(BodyIndexPair::new(0, 1), Vec3::ZERO, Vec3::ZERO, 1.0, 3.0);
        let jacobian = JointJacobian::build(&joint, 0, &stationary(Vec3::ZERO), &stationary(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(jacobian.rows.len(), 1);
        assert_relative_eq!(jacobian.rows[0].error, 2.0, epsilon = 1e-6);
        assert_eq!(jacobian.rows[0].violation(), 0.0);
    }

    #[test]
    fn fixed_joint_reports_rotation_error() {
        let joint = Joint::fixed(BodyIndexPair::new(0, 1), Transform::IDENTITY, Transform::IDENTITY);
        let rotated = MotionData::stationary(Transform::new(Quat::from_rotation_y(0.3), Vec3::ZERO));
        let jacobian = JointJacobian::build(&joint, 0, &stationary(Vec3::ZERO), &rotated);
        assert_eq!(jacobian.rows.len(), 6);
        assert_relative_eq!(jacobian.rows[4].error, -0.3, epsilon = 1e-5);
    }
}
