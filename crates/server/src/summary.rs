//! Customer summary assembly.
//!
//! The three product lookups run as independent tasks and are joined, never
//! raced. A failed lookup only empties its own section; the only error that
//! leaves `summarize` is the customer lookup's `NotFound`.

use std::sync::Arc;

use clientele_core::config::DownstreamConfig;
use clientele_core::domain::customer::CustomerId;
use clientele_core::domain::product::{ProductKind, ProductRecord};
use clientele_core::domain::summary::{CustomerSummary, SectionStatus, SummarySection};
use clientele_core::errors::ApplicationError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::gateway::{endpoint, OutboundGateway, OutboundRequest, ResponseShape};
use crate::lifecycle::CustomerLifecycle;

type SectionTask = JoinHandle<Result<Vec<ProductRecord>, ApplicationError>>;

#[derive(Clone)]
pub struct SummaryOrchestrator {
    lifecycle: CustomerLifecycle,
    gateway: Arc<OutboundGateway>,
    downstream: DownstreamConfig,
}

impl SummaryOrchestrator {
    pub fn new(
        lifecycle: CustomerLifecycle,
        gateway: Arc<OutboundGateway>,
        downstream: DownstreamConfig,
    ) -> Self {
        Self { lifecycle, gateway, downstream }
    }

    pub async fn summarize(&self, id: &CustomerId) -> Result<CustomerSummary, ApplicationError> {
        let customer = self.lifecycle.get(id).await?;

        // Spawned so a dropped request does not cancel calls already in flight.
        let accounts = self.spawn_section(ProductKind::Account, &customer.id);
        let cards = self.spawn_section(ProductKind::Card, &customer.id);
        let credits = self.spawn_section(ProductKind::Credit, &customer.id);

        let (accounts, cards, credits) = tokio::join!(
            settle(ProductKind::Account, &customer.id, accounts),
            settle(ProductKind::Card, &customer.id, cards),
            settle(ProductKind::Credit, &customer.id, credits),
        );

        let degraded = [&accounts, &cards, &credits]
            .iter()
            .filter(|section| section.status == SectionStatus::Degraded)
            .count();
        let summary = CustomerSummary::assemble(&customer, accounts, cards, credits);

        info!(
            event_name = "summary.built",
            customer_id = %summary.id,
            accounts = summary.accounts.len(),
            cards = summary.cards.len(),
            credits = summary.credits.len(),
            degraded_sections = degraded,
            "customer summary built"
        );
        Ok(summary)
    }

    fn base_url(&self, kind: ProductKind) -> &str {
        match kind {
            ProductKind::Account => &self.downstream.accounts_url,
            ProductKind::Card => &self.downstream.cards_url,
            ProductKind::Credit => &self.downstream.credits_url,
        }
    }

    fn spawn_section(&self, kind: ProductKind, customer_id: &CustomerId) -> SectionTask {
        let gateway = Arc::clone(&self.gateway);
        let request = OutboundRequest::get(kind.target(), endpoint(self.base_url(kind), kind.path()))
            .query("clientId", customer_id.as_str())
            .expect(ResponseShape::Many);

        tokio::spawn(async move { gateway.call::<ProductRecord>(request).await })
    }
}

async fn settle(kind: ProductKind, customer_id: &CustomerId, task: SectionTask) -> SummarySection {
    match task.await {
        Ok(Ok(records)) => SummarySection::loaded(kind, records),
        Ok(Err(error)) => {
            warn!(
                event_name = "summary.section.degraded",
                customer_id = %customer_id,
                section = %kind,
                target = kind.target(),
                error = %error,
                "summary section degraded to empty"
            );
            SummarySection::degraded(kind)
        }
        Err(join_error) => {
            warn!(
                event_name = "summary.section.degraded",
                customer_id = %customer_id,
                section = %kind,
                target = kind.target(),
                error = %join_error,
                "summary section task aborted"
            );
            SummarySection::degraded(kind)
        }
    }
}
