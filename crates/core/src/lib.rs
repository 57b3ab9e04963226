pub mod config;
pub mod domain;
pub mod errors;
pub mod resilience;

pub use domain::customer::{Customer, CustomerDraft, CustomerId, CustomerProfile, CustomerType};
pub use domain::product::{Account, Card, Credit, ProductKind, ProductRecord};
pub use domain::summary::{CustomerSummary, SectionStatus, SummarySection};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use resilience::{BreakerRegistry, CircuitBreaker, CircuitBreakerPolicy, CircuitState};
