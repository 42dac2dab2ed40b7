// Quality tiers and their loading profiles

use crate::loader::ResourceKind;
use serde::{Deserialize, Serialize};

/// Discrete degradation level, ordered from best to most constrained
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum QualityTier {
    #[default]
    Full,
    Reduced,
    Minimal,
}

impl QualityTier {
    /// Get the lowercase name of this tier
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Full => "full",
            QualityTier::Reduced => "reduced",
            QualityTier::Minimal => "minimal",
        }
    }

    /// Check if this tier is below `Full`
    pub fn is_degraded(&self) -> bool {
        *self != QualityTier::Full
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the background queue behaves at a given tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TierProfile {
    /// Maximum background fetches running at once
    pub concurrency_cap: usize,

    /// Kinds that are skipped instead of loaded
    pub skip_kinds: Vec<ResourceKind>,

    /// Multiplier applied to retry backoff
    pub backoff_scale: f64,
}

impl TierProfile {
    pub fn new(concurrency_cap: usize, skip_kinds: Vec<ResourceKind>, backoff_scale: f64) -> Self {
        Self {
            concurrency_cap,
            skip_kinds,
            backoff_scale,
        }
    }

    /// Effective concurrency cap; never below one
    pub fn cap(&self) -> usize {
        self.concurrency_cap.max(1)
    }

    /// Check if a kind is skipped at this tier
    pub fn skips(&self, kind: ResourceKind) -> bool {
        self.skip_kinds.contains(&kind)
    }
}

impl Default for TierProfile {
    fn default() -> Self {
        Self::new(4, Vec::new(), 1.0)
    }
}

/// Profiles for every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TierTable {
    pub full: TierProfile,
    pub reduced: TierProfile,
    pub minimal: TierProfile,
}

impl TierTable {
    /// Get the profile for a tier
    pub fn profile(&self, tier: QualityTier) -> &TierProfile {
        match tier {
            QualityTier::Full => &self.full,
            QualityTier::Reduced => &self.reduced,
            QualityTier::Minimal => &self.minimal,
        }
    }

    /// Get a mutable profile for a tier
    pub fn profile_mut(&mut self, tier: QualityTier) -> &mut TierProfile {
        match tier {
            QualityTier::Full => &mut self.full,
            QualityTier::Reduced => &mut self.reduced,
            QualityTier::Minimal => &mut self.minimal,
        }
    }

    /// Concurrency cap for a tier
    pub fn concurrency_cap(&self, tier: QualityTier) -> usize {
        self.profile(tier).cap()
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            full: TierProfile::new(4, Vec::new(), 1.0),
            reduced: TierProfile::new(2, Vec::new(), 2.0),
            minimal: TierProfile::new(
                1,
                vec![ResourceKind::Texture, ResourceKind::EnvironmentMap],
                4.0,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(QualityTier::Full < QualityTier::Reduced);
        assert!(QualityTier::Reduced < QualityTier::Minimal);
        assert!(!QualityTier::Full.is_degraded());
        assert!(QualityTier::Minimal.is_degraded());
    }

    #[test]
    fn test_default_table_caps_shrink() {
        let table = TierTable::default();
        assert!(table.concurrency_cap(QualityTier::Full) > table.concurrency_cap(QualityTier::Reduced));
        assert!(
            table.concurrency_cap(QualityTier::Reduced) >= table.concurrency_cap(QualityTier::Minimal)
        );
    }

    #[test]
    fn test_cap_never_zero() {
        let profile = TierProfile::new(0, Vec::new(), 1.0);
        assert_eq!(profile.cap(), 1);
    }

    #[test]
    fn test_minimal_skips_textures() {
        let table = TierTable::default();
        assert!(table.profile(QualityTier::Minimal).skips(ResourceKind::Texture));
        assert!(!table.profile(QualityTier::Minimal).skips(ResourceKind::Model));
        assert!(!table.profile(QualityTier::Full).skips(ResourceKind::Texture));
    }

    #[test]
    fn test_profile_mut() {
        let mut table = TierTable::default();
        table.profile_mut(QualityTier::Minimal).skip_kinds = vec![ResourceKind::Other];
        assert!(table.profile(QualityTier::Minimal).skips(ResourceKind::Other));
    }
}
