use crate::db::DailyStepsRow;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BestDay {
    pub date: String,
    pub steps: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub from: String,
    pub to: String,
    pub days_recorded: usize,
    pub total_steps: u64,
    pub total_distance_km: f64,
    pub total_calories: u64,
    pub total_points: u64,
    pub average_steps: u64,
    pub days_goal_reached: usize,
    pub best_day: Option<BestDay>,
}

pub fn build_period_summary(
    from: NaiveDate,
    to: NaiveDate,
    rows: &[DailyStepsRow],
) -> PeriodSummary {
    let total_steps = rows.iter().map(|row| row.steps.max(0) as u64).sum::<u64>();
    let total_distance_km = rows.iter().map(|row| row.distance_km.max(0.0)).sum::<f64>();
    let total_calories = rows
        .iter()
        .map(|row| row.calories.max(0) as u64)
        .sum::<u64>();
    let total_points = rows.iter().map(|row| row.points.max(0) as u64).sum::<u64>();
    let days_goal_reached = rows.iter().filter(|row| row.goal_reached).count();

    let best_day = rows
        .iter()
        .max_by_key(|row| row.steps)
        .map(|row| BestDay {
            date: row.date.clone(),
            steps: row.steps.max(0) as u64,
        });

    let average_steps = if rows.is_empty() {
        0
    } else {
        total_steps / rows.len() as u64
    };

    PeriodSummary {
        from: from.format("%Y-%m-%d").to_string(),
        to: to.format("%Y-%m-%d").to_string(),
        days_recorded: rows.len(),
        total_steps,
        total_distance_km: (total_distance_km * 100.0).round() / 100.0,
        total_calories,
        total_points,
        average_steps,
        days_goal_reached,
        best_day,
    }
}

#[cfg(test)]
mod tests {
    use super::build_period_summary;
    use crate::db::DailyStepsRow;
    use chrono::NaiveDate;

    fn row(date: &str, steps: i64, goal_reached: bool) -> DailyStepsRow {
        DailyStepsRow {
            id: 0,
            date: date.to_string(),
            steps,
            distance_km: steps as f64 * 0.762 / 1000.0,
            calories: (steps as f64 * 0.04).floor() as i64,
            points: steps / 50,
            goal_reached,
            updated_at: 0,
        }
    }

    #[test]
    fn aggregates_a_week_of_rows() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 20).expect("date");
        let to = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");
        let rows = vec![
            row("2026-01-24", 11_500, true),
            row("2026-01-25", 6_200, false),
            row("2026-01-26", 10_456, true),
        ];

        let summary = build_period_summary(from, to, &rows);

        assert_eq!(summary.days_recorded, 3);
        assert_eq!(summary.total_steps, 28_156);
        assert_eq!(summary.average_steps, 9_385);
        assert_eq!(summary.days_goal_reached, 2);
        assert_eq!(
            summary.best_day.as_ref().map(|day| day.date.as_str()),
            Some("2026-01-24")
        );
    }

    #[test]
    fn empty_period_has_zero_averages() {
        let from = NaiveDate::from_ymd_opt(2026, 1, 20).expect("date");
        let to = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");

        let summary = build_period_summary(from, to, &[]);

        assert_eq!(summary.days_recorded, 0);
        assert_eq!(summary.total_steps, 0);
        assert_eq!(summary.average_steps, 0);
        assert!(summary.best_day.is_none());
    }
}
