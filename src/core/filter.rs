use serde::{Deserialize, Serialize};

/// Bit-mask collision filter.
///
/// A non-zero `group_index` overrides the masks for filters sharing it:
/// positive groups always collide, negative groups never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub belongs_to: u32,
    pub collides_with: u32,
    pub group_index: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CollisionFilter {
    pub const DEFAULT: Self = Self {
        belongs_to: u32::MAX,
        collides_with: u32::MAX,
        group_index: 0,
    };

    pub const ZERO: Self = Self {
        belongs_to: 0,
        collides_with: 0,
        group_index: 0,
    };

    pub fn new(belongs_to: u32, collides_with: u32) -> Self {
        Self {
            belongs_to,
            collides_with,
            group_index: 0,
        }
    }

    pub fn with_group(mut self, group_index: i32) -> Self {
        self.group_index = group_index;
        self
    }

    /// A filter that can never collide with anything.
    pub fn is_empty(&self) -> bool {
        self.belongs_to == 0 || self.collides_with == 0
    }

    pub fn is_collision_enabled(a: &CollisionFilter, b: &CollisionFilter) -> bool {
        if a.group_index != 0 && a.group_index == b.group_index {
            return a.group_index > 0;
        }
        (a.belongs_to & b.collides_with) != 0 && (b.belongs_to & a.collides_with) != 0
    }

    /// Filter accepting everything either input accepts.
    pub fn union(a: &CollisionFilter, b: &CollisionFilter) -> CollisionFilter {
        CollisionFilter {
            belongs_to: a.belongs_to | b.belongs_to,
            collides_with: a.collides_with | b.collides_with,
            group_index: if a.group_index == b.group_index {
                a.group_index
            } else {
                0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_must_match_both_ways() {
        let a = CollisionFilter::new(0b01, 0b10);
        let b = CollisionFilter::new(0b10, 0b01);
        let c = CollisionFilter::new(0b10, 0b10);
        assert!(CollisionFilter::is_collision_enabled(&a, &b));
        assert!(!CollisionFilter::is_collision_enabled(&a, &c));
        assert!(!CollisionFilter::is_collision_enabled(
            &CollisionFilter::DEFAULT,
            &CollisionFilter::ZERO
        ));
    }

    #[test]
    fn groups_override_masks() {
        let never = CollisionFilter::DEFAULT.with_group(-3);
        assert!(!CollisionFilter::is_collision_enabled(&never, &never));
        let always = CollisionFilter::new(1, 0).with_group(2);
        assert!(CollisionFilter::is_collision_enabled(&always, &always));
    }

    #[test]
    fn union_accumulates_bits() {
        let u = CollisionFilter::union(&CollisionFilter::new(1, 2), &CollisionFilter::new(4, 8));
        assert_eq!(u.belongs_to, 5);
        assert_eq!(u.collides_with, 10);
    }
}
