use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Indices of two bodies in the world body array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyIndexPair {
    pub body_a: usize,
    pub body_b: usize,
}

impl BodyIndexPair {
    pub fn new(body_a: usize, body_b: usize) -> Self {
        Self { body_a, body_b }
    }

    /// Same pair with the lower index first.
    pub fn ordered(self) -> Self {
        if self.body_a <= self.body_b {
            self
        } else {
            Self::new(self.body_b, self.body_a)
        }
    }

    pub fn swapped(self) -> Self {
        Self::new(self.body_b, self.body_a)
    }
}

/// Constraint kinds understood by the jacobian builder. Pivots and frames
/// are expressed in each body's own space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointData {
    BallAndSocket {
        pivot_a: Vec3,
        pivot_b: Vec3,
    },
    LimitedDistance {
        pivot_a: Vec3,
        pivot_b: Vec3,
        min_distance: f32,
        max_distance: f32,
    },
    Fixed {
        body_a_from_joint: Transform,
        body_b_from_joint: Transform,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub body_pair: BodyIndexPair,
    pub data: JointData,
    /// When false the scheduler drops contacts between the two bodies.
    pub enable_collision: bool,
}

impl Joint {
    pub fn new(body_pair: BodyIndexPair, data: JointData) -> Self {
        Self {
            body_pair,
            data,
            enable_collision: false,
        }
    }

    pub fn ball_and_socket(body_pair: BodyIndexPair, pivot_a: Vec3, pivot_b: Vec3) -> Self {
        Self::new(body_pair, JointData::BallAndSocket { pivot_a, pivot_b })
    }

    pub fn limited_distance(
        body_pair: BodyIndexPair,
        pivot_a: Vec3,
        pivot_b: Vec3,
        min_distance: f32,
        max_distance: f32,
    ) -> Self {
        Self::new(
            body_pair,
            JointData::LimitedDistance {
                pivot_a,
                pivot_b,
                min_distance,
                max_distance,
            },
        )
    }

    pub fn fixed(
        body_pair: BodyIndexPair,
        body_a_from_joint: Transform,
        body_b_from_joint: Transform,
    ) -> Self {
        Self::new(
            body_pair,
            JointData::Fixed {
                body_a_from_joint,
                body_b_from_joint,
            },
        )
    }

    pub fn with_collision(mut self, enable_collision: bool) -> Self {
        self.enable_collision = enable_collision;
        self
    }
}
