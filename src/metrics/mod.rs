pub mod summary;

use crate::config::Config;
use serde::Serialize;

pub const CALORIES_PER_STEP: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub steps: u64,
    pub distance_km: f64,
    pub calories: u64,
    pub points: u64,
    pub goal_reached: bool,
}

/// Derives the metric snapshot for a cumulative daily step count. Pure: the
/// same input always yields the same output.
pub fn derive(steps: u64, config: &Config) -> DerivedMetrics {
    DerivedMetrics {
        steps,
        distance_km: round2(steps as f64 * config.stride_meters / 1000.0),
        calories: (steps as f64 * CALORIES_PER_STEP).floor() as u64,
        points: steps / config.steps_per_point.max(1),
        goal_reached: steps >= config.daily_goal_steps,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Bronze,
    Silver,
    Gold,
}

impl Level {
    pub fn from_xp(xp: u64) -> Self {
        if xp >= 5000 {
            Self::Gold
        } else if xp >= 2000 {
            Self::Silver
        } else {
            Self::Bronze
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BadgeStatus {
    pub id: &'static str,
    pub title: &'static str,
    pub target_steps: u64,
    pub unlocked: bool,
}

const BADGES: [(&str, &str, u64); 4] = [
    ("first_step", "First Step", 100),
    ("brisk_walker", "Brisk Walker", 1_000),
    ("distance_hero", "Distance Hero", 5_000),
    ("pro_athlete", "Pro Athlete", 10_000),
];

pub fn badge_statuses(lifetime_steps: u64) -> Vec<BadgeStatus> {
    BADGES
        .iter()
        .map(|&(id, title, target_steps)| BadgeStatus {
            id,
            title,
            target_steps,
            unlocked: lifetime_steps >= target_steps,
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{DerivedMetrics, Level, badge_statuses, derive};
    use crate::config::Config;

    fn default_config() -> Config {
        Config::default()
    }

    #[test]
    fn ten_thousand_steps() {
        let metrics = derive(10_000, &default_config());

        assert_eq!(metrics.calories, 400);
        assert_eq!(metrics.distance_km, 7.62);
        assert_eq!(metrics.points, 200);
        assert!(metrics.goal_reached);
    }

    #[test]
    fn calories_floor_is_never_negative() {
        for steps in [0, 1, 24, 25, 99, 10_000, 1_000_000] {
            let metrics = derive(steps, &default_config());
            assert_eq!(metrics.calories, (steps as f64 * 0.04).floor() as u64);
        }
    }

    #[test]
    fn zero_steps_derive_to_zero() {
        let metrics = derive(0, &default_config());

        assert_eq!(
            metrics,
            DerivedMetrics {
                steps: 0,
                distance_km: 0.0,
                calories: 0,
                points: 0,
                goal_reached: false,
            }
        );
    }

    #[test]
    fn derivation_is_idempotent() {
        let config = default_config();
        assert_eq!(derive(8_421, &config), derive(8_421, &config));
    }

    #[test]
    fn alternate_coefficients_from_the_home_screen() {
        let mut config = default_config();
        config.stride_meters = 0.76;
        config.steps_per_point = 100;

        let metrics = derive(10_000, &config);
        assert_eq!(metrics.distance_km, 7.6);
        assert_eq!(metrics.points, 100);
    }

    #[test]
    fn goal_boundary_is_inclusive() {
        let config = default_config();
        assert!(!derive(9_999, &config).goal_reached);
        assert!(derive(10_000, &config).goal_reached);
    }

    #[test]
    fn level_thresholds_are_boundary_exact() {
        assert_eq!(Level::from_xp(0), Level::Bronze);
        assert_eq!(Level::from_xp(1_999), Level::Bronze);
        assert_eq!(Level::from_xp(2_000), Level::Silver);
        assert_eq!(Level::from_xp(4_999), Level::Silver);
        assert_eq!(Level::from_xp(5_000), Level::Gold);
        assert_eq!(Level::from_xp(u64::MAX), Level::Gold);
    }

    #[test]
    fn badges_unlock_at_lifetime_step_targets() {
        let statuses = badge_statuses(1_000);
        assert!(statuses[0].unlocked);
        assert!(statuses[1].unlocked);
        assert!(!statuses[2].unlocked);
        assert!(!statuses[3].unlocked);

        assert!(badge_statuses(10_000).iter().all(|badge| badge.unlocked));
    }
}
