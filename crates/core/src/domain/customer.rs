use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Personal,
    Business,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "PERSONAL",
            Self::Business => "BUSINESS",
        }
    }
}

impl std::str::FromStr for CustomerType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PERSONAL" => Ok(Self::Personal),
            "BUSINESS" => Ok(Self::Business),
            other => Err(DomainError::InvalidField {
                field: "type",
                reason: format!("unsupported customer type `{other}` (expected PERSONAL|BUSINESS)"),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerProfile {
    Standard,
    Vip,
}

impl CustomerProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Vip => "VIP",
        }
    }
}

impl std::str::FromStr for CustomerProfile {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(Self::Standard),
            "VIP" => Ok(Self::Vip),
            other => Err(DomainError::InvalidField {
                field: "profile",
                reason: format!("unsupported customer profile `{other}` (expected STANDARD|VIP)"),
            }),
        }
    }
}

/// Customer master record. The id is assigned on creation and never changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(rename = "type")]
    pub customer_type: CustomerType,
    pub profile: CustomerProfile,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Every mutable customer field; the body of create and update requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub customer_type: CustomerType,
    pub profile: CustomerProfile,
    pub document_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl CustomerDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidField {
                field: "name",
                reason: "name must not be blank".to_string(),
            });
        }

        if self.document_id.trim().is_empty() {
            return Err(DomainError::InvalidField {
                field: "documentId",
                reason: "documentId must not be blank".to_string(),
            });
        }

        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::InvalidField {
                    field: "email",
                    reason: format!("`{email}` is not an email address"),
                });
            }
        }

        Ok(())
    }

    /// Builds the stored record for `id`, overwriting every mutable field.
    pub fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            name: self.name.trim().to_string(),
            customer_type: self.customer_type,
            profile: self.profile,
            document_id: self.document_id.trim().to_string(),
            email: self.email,
            phone_number: self.phone_number,
            address: self.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomerDraft, CustomerId, CustomerProfile, CustomerType};
    use crate::errors::DomainError;

    fn draft() -> CustomerDraft {
        CustomerDraft {
            name: "TEST - customer".to_string(),
            customer_type: CustomerType::Personal,
            profile: CustomerProfile::Vip,
            document_id: "82782345".to_string(),
            email: Some("test@example.com".to_string()),
            phone_number: Some("5555555555555".to_string()),
            address: Some("ADDRESS-test".to_string()),
        }
    }

    #[test]
    fn generated_ids_are_unique_and_non_empty() {
        let first = CustomerId::generate();
        let second = CustomerId::generate();

        assert!(!first.as_str().is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn draft_uses_camel_case_wire_names() {
        let json = serde_json::to_value(draft()).expect("serialize draft");

        assert_eq!(json["type"], "PERSONAL");
        assert_eq!(json["profile"], "VIP");
        assert_eq!(json["documentId"], "82782345");
        assert_eq!(json["phoneNumber"], "5555555555555");
    }

    #[test]
    fn draft_without_optional_fields_deserializes() {
        let parsed: CustomerDraft = serde_json::from_str(
            r#"{"name":"Acme","type":"BUSINESS","profile":"STANDARD","documentId":"20100"}"#,
        )
        .expect("parse draft");

        assert_eq!(parsed.customer_type, CustomerType::Business);
        assert_eq!(parsed.email, None);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn unknown_enum_value_is_rejected_by_serde() {
        let parsed = serde_json::from_str::<CustomerDraft>(
            r#"{"name":"Acme","type":"ALIEN","profile":"STANDARD","documentId":"20100"}"#,
        );

        assert!(parsed.is_err());
    }

    #[test]
    fn blank_name_fails_validation() {
        let mut invalid = draft();
        invalid.name = "   ".to_string();

        assert!(matches!(invalid.validate(), Err(DomainError::InvalidField { field: "name", .. })));
    }

    #[test]
    fn email_without_at_sign_fails_validation() {
        let mut invalid = draft();
        invalid.email = Some("not-an-email".to_string());

        assert!(matches!(
            invalid.validate(),
            Err(DomainError::InvalidField { field: "email", .. })
        ));
    }

    #[test]
    fn into_customer_keeps_given_id() {
        let id = CustomerId("c-1".to_string());
        let customer = draft().into_customer(id.clone());

        assert_eq!(customer.id, id);
        assert_eq!(customer.name, "TEST - customer");
    }

    #[test]
    fn enum_parsing_is_case_insensitive() {
        assert_eq!("business".parse::<CustomerType>().ok(), Some(CustomerType::Business));
        assert_eq!(" vip ".parse::<CustomerProfile>().ok(), Some(CustomerProfile::Vip));
        assert!("gold".parse::<CustomerProfile>().is_err());
    }
}
