use std::sync::Arc;

use clientele_core::domain::customer::{Customer, CustomerDraft, CustomerId};
use clientele_core::errors::ApplicationError;
use clientele_db::repositories::CustomerRepository;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::info;

/// CRUD over customer records. Every store call is single-attempt.
#[derive(Clone)]
pub struct CustomerLifecycle {
    repository: Arc<dyn CustomerRepository>,
}

impl CustomerLifecycle {
    pub fn new(repository: Arc<dyn CustomerRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, draft: CustomerDraft) -> Result<Customer, ApplicationError> {
        draft.validate()?;
        let customer = draft.into_customer(CustomerId::generate());
        self.repository.save(customer.clone()).await?;

        info!(
            event_name = "customer.created",
            customer_id = %customer.id,
            "customer created"
        );
        Ok(customer)
    }

    pub async fn get(&self, id: &CustomerId) -> Result<Customer, ApplicationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::customer_not_found(id.as_str()))
    }

    /// Overwrites every mutable field; the stored id is kept.
    pub async fn update(
        &self,
        id: &CustomerId,
        draft: CustomerDraft,
    ) -> Result<Customer, ApplicationError> {
        draft.validate()?;
        let existing = self.get(id).await?;
        let customer = draft.into_customer(existing.id);
        self.repository.save(customer.clone()).await?;

        info!(
            event_name = "customer.updated",
            customer_id = %customer.id,
            "customer updated"
        );
        Ok(customer)
    }

    pub async fn delete(&self, id: &CustomerId) -> Result<(), ApplicationError> {
        self.get(id).await?;
        // A concurrent delete can still win between the check and the removal.
        if !self.repository.delete(id).await? {
            return Err(ApplicationError::customer_not_found(id.as_str()));
        }

        info!(event_name = "customer.deleted", customer_id = %id, "customer deleted");
        Ok(())
    }

    pub fn list_all(&self) -> BoxStream<'_, Result<Customer, ApplicationError>> {
        self.repository.list_all().map_err(ApplicationError::from).boxed()
    }
}
