use crate::db::Database;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    pub cost: u64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardCatalog {
    pub rewards: Vec<RewardItem>,
}

impl RewardCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rewards catalog: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rewards catalog: {}", path.display()))?;

        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for item in &self.rewards {
            if item.id.trim().is_empty() {
                bail!("Reward with empty id in catalog");
            }
            if !seen.insert(item.id.as_str()) {
                bail!("Duplicate reward id in catalog: {}", item.id);
            }
            if item.cost == 0 {
                bail!("Reward {} has zero cost", item.id);
            }
        }

        Ok(())
    }

    pub fn find(&self, reward_id: &str) -> Option<&RewardItem> {
        self.rewards.iter().find(|item| item.id == reward_id)
    }

    pub fn categories(&self) -> Vec<String> {
        let mut categories = self
            .rewards
            .iter()
            .map(|item| item.category.clone())
            .collect::<Vec<_>>();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// Current redeemable balance: points earned from lifetime XP minus points
/// spent through the redemption ledger.
pub fn points_balance(database: &Database, steps_per_point: u64) -> Result<u64> {
    Ok(points_earned(database, steps_per_point)?.saturating_sub(database.points_spent()?))
}

pub fn points_earned(database: &Database, steps_per_point: u64) -> Result<u64> {
    let (_, xp) = database.lifetime_progress()?;
    Ok(xp / steps_per_point.max(1))
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemOutcome {
    pub reward: RewardItem,
    pub remaining_balance: u64,
}

pub fn redeem(
    database: &mut Database,
    catalog: &RewardCatalog,
    reward_id: &str,
    steps_per_point: u64,
) -> Result<RedeemOutcome> {
    let item = catalog
        .find(reward_id)
        .with_context(|| format!("Unknown reward: {reward_id}"))?;

    let earned = points_earned(database, steps_per_point)?;
    let remaining_balance = database.redeem(&item.id, &item.title, item.cost, earned)?;

    Ok(RedeemOutcome {
        reward: item.clone(),
        remaining_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::{RewardCatalog, points_balance, redeem};
    use crate::db::Database;
    use std::fs;

    fn sample_catalog() -> RewardCatalog {
        serde_json::from_str(include_str!("../../assets/rewards.json")).expect("catalog")
    }

    fn open_temp_db(dir: &tempfile::TempDir) -> Database {
        Database::open(&dir.path().join("test.db")).expect("open db")
    }

    #[test]
    fn bundled_catalog_is_valid() {
        let catalog = sample_catalog();
        assert_eq!(catalog.rewards.len(), 5);
        assert!(catalog.validate().is_ok());
        assert_eq!(
            catalog.categories(),
            vec!["discounts", "donations", "giftcards"]
        );
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("rewards.json");
        fs::write(
            &path,
            r#"{"rewards":[
                {"id":"r1","title":"A","cost":100,"category":"giftcards"},
                {"id":"r1","title":"B","cost":200,"category":"discounts"}
            ]}"#,
        )
        .expect("write");

        assert!(RewardCatalog::load(&path).is_err());
    }

    #[test]
    fn redeem_at_exact_balance_then_nothing_left() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut database = open_temp_db(&dir);
        let catalog = sample_catalog();

        // 40_000 lifetime steps at 50 steps/point = 800 points: exactly r5.
        database.add_lifetime_progress(40_000).expect("progress");
        assert_eq!(points_balance(&database, 50).expect("balance"), 800);

        let outcome = redeem(&mut database, &catalog, "r5", 50).expect("redeem");
        assert_eq!(outcome.remaining_balance, 0);
        assert_eq!(points_balance(&database, 50).expect("balance"), 0);
    }

    #[test]
    fn one_point_short_is_not_redeemable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut database = open_temp_db(&dir);
        let catalog = sample_catalog();

        // 799 points: one short of the 800-point reward.
        database.add_lifetime_progress(39_950).expect("progress");
        assert_eq!(points_balance(&database, 50).expect("balance"), 799);
        assert!(redeem(&mut database, &catalog, "r5", 50).is_err());
    }

    #[test]
    fn unknown_reward_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut database = open_temp_db(&dir);
        let catalog = sample_catalog();

        assert!(redeem(&mut database, &catalog, "r99", 50).is_err());
    }
}
