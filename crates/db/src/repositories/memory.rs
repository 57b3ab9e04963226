use std::collections::HashMap;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::RwLock;

use clientele_core::domain::customer::{Customer, CustomerId};

use super::{CustomerRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

impl InMemoryCustomerRepository {
    pub async fn len(&self) -> usize {
        self.customers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.customers.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        Ok(customers.remove(&id.0).is_some())
    }

    fn list_all(&self) -> BoxStream<'_, Result<Customer, RepositoryError>> {
        // Snapshot under the read lock so the stream never holds it across polls.
        stream::once(async move {
            self.customers.read().await.values().cloned().collect::<Vec<_>>()
        })
        .flat_map(|customers| stream::iter(customers.into_iter().map(Ok)))
        .boxed()
    }
}
