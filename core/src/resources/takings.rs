use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::resource::{
    ResourceKind, Validation, ValidationError, WorkspaceResource, non_negative, resource_status,
    round_cents,
};

resource_status!(TakingsStatus {
    default: Draft,
    Draft => "draft",
    Submitted => "submitted",
    Reconciled => "reconciled",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTakings {
    pub date: NaiveDate,
    #[serde(default)]
    pub cash: f64,
    #[serde(default)]
    pub card: f64,
    #[serde(default)]
    pub other: f64,
}

impl DailyTakings {
    pub fn total(&self) -> f64 {
        self.cash + self.card + self.other
    }
}

/// Seven days of sales by payment method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTakings {
    pub week_start: NaiveDate,
    #[serde(default)]
    pub days: Vec<DailyTakings>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: TakingsStatus,
}

impl WeeklyTakings {
    pub fn total(&self) -> f64 {
        round_cents(self.days.iter().map(DailyTakings::total).sum())
    }
}

impl WorkspaceResource for WeeklyTakings {
    const KIND: ResourceKind = ResourceKind::WeeklyTakings;

    type Status = TakingsStatus;

    fn status(&self) -> TakingsStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        let week_end = self
            .week_start
            .checked_add_days(Days::new(7))
            .ok_or_else(|| ValidationError::new("weekStart is out of range"))?;

        let mut seen = HashSet::new();
        for day in &self.days {
            if day.date < self.week_start || day.date >= week_end {
                return Err(ValidationError::new(format!(
                    "{} falls outside the takings week",
                    day.date
                )));
            }
            if !seen.insert(day.date) {
                return Err(ValidationError::new(format!(
                    "{} is listed more than once",
                    day.date
                )));
            }
            non_negative(day.cash, "cash")?;
            non_negative(day.card, "card")?;
            non_negative(day.other, "other")?;
        }
        Ok(())
    }

    fn derived(&self) -> Map<String, Value> {
        let by_method = |pick: fn(&DailyTakings) -> f64| {
            round_cents(self.days.iter().map(pick).sum())
        };

        let mut derived = Map::new();
        derived.insert("total".to_owned(), json!(self.total()));
        derived.insert(
            "totals".to_owned(),
            json!({
                "cash": by_method(|day| day.cash),
                "card": by_method(|day| day.card),
                "other": by_method(|day| day.other),
            }),
        );
        derived
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::decode_body;

    #[test]
    fn totals_add_up_per_method() {
        let takings: WeeklyTakings = decode_body(json!({
            "weekStart": "2024-06-03",
            "days": [
                { "date": "2024-06-03", "cash": 120.10, "card": 880.40 },
                { "date": "2024-06-04", "cash": 95, "card": 700, "other": 12.5 },
            ],
        }))
        .unwrap();
        let derived = takings.derived();
        assert_eq!(derived["total"], json!(1808.0));
        assert_eq!(derived["totals"]["cash"], json!(215.1));
    }

    #[test]
    fn rejects_duplicate_days() {
        let result = decode_body::<WeeklyTakings>(json!({
            "weekStart": "2024-06-03",
            "days": [
                { "date": "2024-06-03", "cash": 1 },
                { "date": "2024-06-03", "cash": 2 },
            ],
        }));
        assert!(result.is_err());
    }
}
