use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The downstream product families a customer summary is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Account,
    Card,
    Credit,
}

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [Self::Account, Self::Card, Self::Credit];

    /// Circuit-breaker target the kind is served by.
    pub fn target(&self) -> &'static str {
        match self {
            Self::Account => "accounts-service",
            Self::Card => "cards-service",
            Self::Credit => "credits-service",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Account => "/v1/accounts",
            Self::Card => "/v1/cards",
            Self::Credit => "/v1/credits",
        }
    }

    pub fn section(&self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::Card => "cards",
            Self::Credit => "credits",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.section())
    }
}

/// A record owned by a downstream service, kept as the JSON object it arrived
/// as. Nothing in it is interpreted, so any field shape passes through.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord(Map<String, Value>);

impl ProductRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn id(&self) -> Option<&Value> {
        self.get("id")
    }

    pub fn client_id(&self) -> Option<&Value> {
        self.get("clientId")
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ProductRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

pub type Account = ProductRecord;
pub type Card = ProductRecord;
pub type Credit = ProductRecord;
