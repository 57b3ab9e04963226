use serde::{Deserialize, Serialize};

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::product::{Account, Card, Credit, ProductKind, ProductRecord};

/// Composite view of a customer and its downstream products. Built per
/// request, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: CustomerId,
    pub name: String,
    pub accounts: Vec<Account>,
    pub cards: Vec<Card>,
    pub credits: Vec<Credit>,
}

/// How one summary section was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionStatus {
    Loaded,
    Degraded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SummarySection {
    pub kind: ProductKind,
    pub status: SectionStatus,
    pub records: Vec<ProductRecord>,
}

impl SummarySection {
    pub fn loaded(kind: ProductKind, records: Vec<ProductRecord>) -> Self {
        Self { kind, status: SectionStatus::Loaded, records }
    }

    /// A failed downstream contributes an empty list.
    pub fn degraded(kind: ProductKind) -> Self {
        Self { kind, status: SectionStatus::Degraded, records: Vec::new() }
    }
}

impl CustomerSummary {
    pub fn assemble(
        customer: &Customer,
        accounts: SummarySection,
        cards: SummarySection,
        credits: SummarySection,
    ) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.name.clone(),
            accounts: accounts.records,
            cards: cards.records,
            credits: credits.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CustomerSummary, SectionStatus, SummarySection};
    use crate::domain::customer::{Customer, CustomerId, CustomerProfile, CustomerType};
    use crate::domain::product::{ProductKind, ProductRecord};

    fn customer() -> Customer {
        Customer {
            id: CustomerId("c-1".to_string()),
            name: "Jane Doe".to_string(),
            customer_type: CustomerType::Personal,
            profile: CustomerProfile::Standard,
            document_id: "44556677".to_string(),
            email: None,
            phone_number: None,
            address: None,
        }
    }

    #[test]
    fn degraded_section_is_empty() {
        let section = SummarySection::degraded(ProductKind::Card);

        assert_eq!(section.status, SectionStatus::Degraded);
        assert!(section.records.is_empty());
    }

    #[test]
    fn assembled_summary_matches_wire_shape() {
        let account: ProductRecord =
            serde_json::from_value(json!({"id": "a1"})).expect("parse account");
        let summary = CustomerSummary::assemble(
            &customer(),
            SummarySection::loaded(ProductKind::Account, vec![account]),
            SummarySection::degraded(ProductKind::Card),
            SummarySection::loaded(ProductKind::Credit, Vec::new()),
        );

        assert_eq!(
            serde_json::to_value(&summary).expect("serialize summary"),
            json!({
                "id": "c-1",
                "name": "Jane Doe",
                "accounts": [{"id": "a1"}],
                "cards": [],
                "credits": []
            })
        );
    }
}
