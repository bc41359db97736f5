use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::resource::{
    ResourceKind, Validation, ValidationError, WorkspaceResource, non_blank, non_negative,
    resource_status, round_cents,
};

resource_status!(OrderStatus {
    default: Draft,
    Draft => "draft",
    Submitted => "submitted",
    Received => "received",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_price: f64,
}

/// Purchase order sent to a supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub supplier: String,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    pub fn total(&self) -> f64 {
        round_cents(
            self.lines
                .iter()
                .map(|line| line.quantity * line.unit_price)
                .sum(),
        )
    }
}

impl WorkspaceResource for Order {
    const KIND: ResourceKind = ResourceKind::Order;

    type Status = OrderStatus;

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        non_blank(&self.supplier, "supplier")?;
        for line in &self.lines {
            non_blank(&line.item, "line item")?;
            non_negative(line.quantity, "quantity")?;
            non_negative(line.unit_price, "unitPrice")?;
        }
        if let (Some(ordered), Some(expected)) = (self.order_date, self.expected_delivery) {
            if expected < ordered {
                return Err(ValidationError::new(
                    "expectedDelivery cannot be before orderDate",
                ));
            }
        }
        if self.status == OrderStatus::Submitted && self.lines.is_empty() {
            return Err(ValidationError::new("an order needs at least one line"));
        }
        Ok(())
    }

    fn derived(&self) -> Map<String, Value> {
        let mut derived = Map::new();
        derived.insert("total".to_owned(), json!(self.total()));
        derived
    }
}
