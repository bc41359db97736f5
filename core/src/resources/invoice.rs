use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::resource::{
    ResourceKind, Validation, ValidationError, WorkspaceResource, non_blank, non_negative,
    resource_status,
};

resource_status!(InvoiceStatus {
    default: Unpaid,
    Unpaid => "unpaid",
    Paid => "paid",
    Overdue => "overdue",
    Disputed => "disputed",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub supplier: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: InvoiceStatus,
}

fn default_currency() -> String {
    "USD".to_owned()
}

impl WorkspaceResource for Invoice {
    const KIND: ResourceKind = ResourceKind::Invoice;

    type Status = InvoiceStatus;

    fn status(&self) -> InvoiceStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        non_blank(&self.supplier, "supplier")?;
        non_blank(&self.invoice_number, "invoiceNumber")?;
        non_negative(self.amount, "amount")?;
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::new(
                "currency must be a three-letter ISO code",
            ));
        }
        if let Some(due) = self.due_date {
            if due < self.issue_date {
                return Err(ValidationError::new("dueDate cannot be before issueDate"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::decode_body;

    #[test]
    fn currency_defaults_and_is_checked() {
        let invoice: Invoice = decode_body(json!({
            "supplier": "Linen Hire",
            "invoiceNumber": "INV-204",
            "issueDate": "2024-07-01",
            "amount": 320.5,
        }))
        .unwrap();
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);

        assert!(decode_body::<Invoice>(json!({
            "supplier": "Linen Hire",
            "invoiceNumber": "INV-205",
            "issueDate": "2024-07-01",
            "amount": 10,
            "currency": "dollars",
        }))
        .is_err());
    }
}
