pub mod api;
pub mod bootstrap;
pub mod gateway;
pub mod health;
pub mod lifecycle;
pub mod summary;

#[cfg(test)]
pub(crate) mod stub;

pub use bootstrap::{bootstrap, Application, BootstrapError};
pub use gateway::{OutboundGateway, OutboundMethod, OutboundRequest, ResponseShape};
pub use lifecycle::CustomerLifecycle;
pub use summary::SummaryOrchestrator;
