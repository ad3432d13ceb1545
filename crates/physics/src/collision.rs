//! Collision groups and filtering.

use rapier3d::prelude::*;

/// Collision groups for different body types.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionGroup {
    /// Static world proxies (floor, scene collision boxes)
    Environment = 1 << 0,
    /// Player body
    Player = 1 << 1,
    /// Grabbable props and runtime-spawned models
    Prop = 1 << 2,
    /// Thrown projectiles
    Projectile = 1 << 3,
}

impl CollisionGroup {
    /// Membership/filter pair for this group.
    pub fn pair(self) -> (Group, Group) {
        let membership = Group::from_bits_retain(self as u32);
        let filter = match self {
            Self::Environment => Group::ALL,
            Self::Player => Group::from_bits_retain(Self::Environment as u32 | Self::Prop as u32),
            Self::Prop => Group::ALL,
            Self::Projectile => Group::from_bits_retain(
                Self::Environment as u32 | Self::Prop as u32 | Self::Projectile as u32,
            ),
        };
        (membership, filter)
    }

    /// Rapier interaction groups for colliders in this group.
    pub fn interaction_groups(self) -> InteractionGroups {
        let (membership, filter) = self.pair();
        InteractionGroups::new(membership, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ignores_projectiles() {
        let (player, player_filter) = CollisionGroup::Player.pair();
        let (projectile, projectile_filter) = CollisionGroup::Projectile.pair();
        assert!(!player_filter.intersects(projectile));
        assert!(!projectile_filter.intersects(player));
    }

    #[test]
    fn props_collide_with_everything() {
        let (_, filter) = CollisionGroup::Prop.pair();
        assert_eq!(filter, Group::ALL);
    }
}
