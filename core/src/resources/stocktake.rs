use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    ids::UserId,
    resource::{
        ResourceKind, Validation, ValidationError, WorkspaceResource, non_blank, non_negative,
        resource_status,
    },
};

resource_status!(StocktakeStatus {
    default: InProgress,
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCount {
    pub item: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub expected: f64,
    #[serde(default)]
    pub counted: Option<f64>,
}

impl StockCount {
    /// Counted minus expected; `None` until the item has been counted.
    pub fn variance(&self) -> Option<f64> {
        self.counted.map(|counted| counted - self.expected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stocktake {
    pub location: String,
    pub count_date: NaiveDate,
    #[serde(default)]
    pub items: Vec<StockCount>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub status: StocktakeStatus,
}

impl WorkspaceResource for Stocktake {
    const KIND: ResourceKind = ResourceKind::Stocktake;

    type Status = StocktakeStatus;

    fn status(&self) -> StocktakeStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        non_blank(&self.location, "location")?;
        for count in &self.items {
            non_blank(&count.item, "item")?;
            non_negative(count.expected, "expected")?;
            if let Some(counted) = count.counted {
                non_negative(counted, "counted")?;
            }
        }
        if self.status == StocktakeStatus::Completed
            && self.items.iter().any(|count| count.counted.is_none())
        {
            return Err(ValidationError::new(
                "every item must be counted before completing a stocktake",
            ));
        }
        Ok(())
    }

    fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn derived(&self) -> Map<String, Value> {
        let variance: Vec<Value> = self
            .items
            .iter()
            .map(|count| json!({ "item": count.item, "variance": count.variance() }))
            .collect();
        let total: f64 = self.items.iter().filter_map(StockCount::variance).sum();

        let mut derived = Map::new();
        derived.insert("variance".to_owned(), Value::Array(variance));
        derived.insert("totalVariance".to_owned(), json!(total));
        derived
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::decode_body;

    #[test]
    fn variance_only_covers_counted_items() {
        let stocktake: Stocktake = decode_body(json!({
            "location": "Cellar",
            "countDate": "2024-06-30",
            "items": [
                { "item": "Pinot", "expected": 12, "counted": 10 },
                { "item": "Shiraz", "expected": 6 },
            ],
        }))
        .unwrap();
        let derived = stocktake.derived();
        assert_eq!(derived["totalVariance"], json!(-2.0));
        assert_eq!(derived["variance"][1]["variance"], Value::Null);
    }

    #[test]
    fn completion_requires_all_counts() {
        let result = decode_body::<Stocktake>(json!({
            "location": "Cellar",
            "countDate": "2024-06-30",
            "status": "completed",
            "items": [{ "item": "Pinot", "expected": 12 }],
        }));
        assert!(result.is_err());
    }
}
