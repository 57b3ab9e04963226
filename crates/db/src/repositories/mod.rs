use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use clientele_core::domain::customer::{Customer, CustomerId};
use clientele_core::errors::ApplicationError;

pub mod customer;
pub mod memory;

pub use customer::SqlCustomerRepository;
pub use memory::InMemoryCustomerRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Persistence boundary for customer records. Every call is a single,
/// non-transactional operation; concurrent saves to one id are last-writer-wins.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Inserts or fully replaces the record stored under `customer.id`.
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;

    /// Returns `true` when a record was removed.
    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError>;

    /// Lazily yields every stored customer in no particular order.
    fn list_all(&self) -> BoxStream<'_, Result<Customer, RepositoryError>>;
}
