use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    ids::UserId,
    resource::{
        ResourceKind, Validation, ValidationError, WorkspaceResource, resource_status, round_cents,
    },
};

resource_status!(RosterStatus {
    default: Draft,
    Draft => "draft",
    Published => "published",
    Archived => "archived",
});

/// A shift on the roster. Times are local wall-clock `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub staff_name: String,
    pub day: NaiveDate,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub position: Option<String>,
}

impl Shift {
    fn times(&self) -> Result<(NaiveTime, NaiveTime), ValidationError> {
        Ok((parse_clock(&self.start, "start")?, parse_clock(&self.end, "end")?))
    }

    pub fn hours(&self) -> f64 {
        match self.times() {
            Ok((start, end)) => (end - start).num_minutes() as f64 / 60.0,
            Err(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub week_start: NaiveDate,
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: RosterStatus,
}

impl Roster {
    pub fn total_hours(&self) -> f64 {
        round_cents(self.shifts.iter().map(Shift::hours).sum())
    }
}

impl WorkspaceResource for Roster {
    const KIND: ResourceKind = ResourceKind::Roster;

    type Status = RosterStatus;

    fn status(&self) -> RosterStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        let week_end = self
            .week_start
            .checked_add_days(Days::new(7))
            .ok_or_else(|| ValidationError::new("weekStart is out of range"))?;

        for shift in &self.shifts {
            if shift.user_id.is_none() && shift.staff_name.trim().is_empty() {
                return Err(ValidationError::new(
                    "each shift needs a userId or a staffName",
                ));
            }
            if shift.day < self.week_start || shift.day >= week_end {
                return Err(ValidationError::new(format!(
                    "shift on {} falls outside the rostered week",
                    shift.day
                )));
            }
            let (start, end) = shift.times()?;
            if end <= start {
                return Err(ValidationError::new("shift end must be after its start"));
            }
        }
        Ok(())
    }

    fn referenced_users(&self) -> Vec<&str> {
        self.shifts
            .iter()
            .filter_map(|shift| shift.user_id.as_deref())
            .collect()
    }

    fn derived(&self) -> Map<String, Value> {
        let mut derived = Map::new();
        derived.insert("totalHours".to_owned(), json!(self.total_hours()));
        derived
    }
}

fn parse_clock(value: &str, field: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ValidationError::new(format!("shift {field} must be HH:MM")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::decode_body;

    #[test]
    fn sums_shift_hours_and_collects_users() {
        let roster: Roster = decode_body(json!({
            "weekStart": "2024-06-03",
            "shifts": [
                { "userId": "u-1", "day": "2024-06-03", "start": "09:00", "end": "17:30" },
                { "staffName": "Casual Sam", "day": "2024-06-04", "start": "18:00", "end": "22:00" },
            ],
        }))
        .unwrap();
        assert_eq!(roster.total_hours(), 12.5);
        assert_eq!(roster.referenced_users(), vec!["u-1"]);
    }

    #[test]
    fn rejects_inverted_or_out_of_week_shifts() {
        let inverted = json!({
            "weekStart": "2024-06-03",
            "shifts": [{ "staffName": "Ana", "day": "2024-06-03", "start": "17:00", "end": "09:00" }],
        });
        assert!(decode_body::<Roster>(inverted).is_err());

        let outside = json!({
            "weekStart": "2024-06-03",
            "shifts": [{ "staffName": "Ana", "day": "2024-06-10", "start": "09:00", "end": "12:00" }],
        });
        assert!(decode_body::<Roster>(outside).is_err());

        let bad_clock = json!({
            "weekStart": "2024-06-03",
            "shifts": [{ "staffName": "Ana", "day": "2024-06-03", "start": "9am", "end": "12:00" }],
        });
        assert!(decode_body::<Roster>(bad_clock).is_err());
    }
}
