pub const CREATE_DAILY_STEPS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_steps (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  date         TEXT NOT NULL UNIQUE,
  steps        INTEGER NOT NULL DEFAULT 0,
  distance_km  REAL NOT NULL DEFAULT 0,
  calories     INTEGER NOT NULL DEFAULT 0,
  points       INTEGER NOT NULL DEFAULT 0,
  goal_reached INTEGER NOT NULL DEFAULT 0,
  updated_at   INTEGER NOT NULL
);
"#;

pub const CREATE_KV: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
  key   TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#;

pub const CREATE_REDEMPTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS redemptions (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  reward_id   TEXT NOT NULL,
  title       TEXT NOT NULL,
  cost        INTEGER NOT NULL,
  redeemed_at INTEGER NOT NULL
);
"#;

pub const INDEX_DAILY_STEPS_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_steps_date ON daily_steps(date);";

pub const INDEX_REDEMPTIONS_REDEEMED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_redemptions_redeemed_at ON redemptions(redeemed_at);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_DAILY_STEPS,
        CREATE_KV,
        CREATE_REDEMPTIONS,
        INDEX_DAILY_STEPS_DATE,
        INDEX_REDEMPTIONS_REDEEMED_AT,
    ]
}
