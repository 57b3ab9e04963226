use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Discriminator shared by every error the service reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ExternalCallFailed,
    MalformedInput,
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("{resource} `{id}` not found")]
    NotFound { resource: &'static str, id: String },
    #[error("external call to `{target}` failed")]
    ExternalCallFailed { target: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn customer_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { resource: "customer", id: id.into() }
    }

    pub fn external_call_failed(target: impl Into<String>) -> Self {
        Self::ExternalCallFailed { target: target.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ExternalCallFailed { .. } => ErrorKind::ExternalCallFailed,
            Self::Domain(_) | Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::Persistence(_) | Self::Configuration(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Stable error code clients can match on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "CUSTOMER-001",
            Self::BadRequest { .. } => "CUSTOMER-002",
            Self::BadGateway { .. } => "CUSTOMER-003",
            Self::ServiceUnavailable { .. } => "CUSTOMER-004",
            Self::Internal { .. } => "CUSTOMER-005",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "Customer not found.",
            Self::BadGateway { .. } => "A downstream service did not respond correctly.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::NotFound { .. } => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            ApplicationError::Domain(ref error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::MalformedInput(message) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::ExternalCallFailed { .. } => {
                Self::BadGateway { message: value.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
