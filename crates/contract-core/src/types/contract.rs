//! Rental contract aggregate rendered into the signed document.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A person taking part in the contract (landlord, tenant, co-signer or witness).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Full legal name.
    pub full_name: String,
    /// National identity document number.
    pub id_number: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Address for notices.
    #[serde(default)]
    pub address: Option<String>,
}

impl Party {
    pub fn new(full_name: impl Into<String>, id_number: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            id_number: id_number.into(),
            phone: None,
            email: None,
            address: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    fn validate(&self, role: &str) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(Error::validation(
                format!("{role}.full_name"),
                "name is required",
            ));
        }
        if self.id_number.trim().is_empty() {
            return Err(Error::validation(
                format!("{role}.id_number"),
                "identity document is required",
            ));
        }
        Ok(())
    }
}

/// The leased property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub address: String,
    pub city: String,
    /// Kind of property, e.g. "apartamento" or "casa".
    #[serde(default = "default_property_type")]
    pub property_type: String,
    /// Real-estate registry number, when known.
    #[serde(default)]
    pub registration_number: Option<String>,
}

fn default_property_type() -> String {
    "inmueble".to_string()
}

/// Economic terms of the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTerms {
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    /// Day of month the rent is due (1-31).
    pub due_day: u8,
    /// Fee charged when the rent is paid after the due day.
    pub late_fee: Decimal,
}

impl PricingTerms {
    fn validate(&self) -> Result<()> {
        if self.monthly_rent.is_sign_negative() {
            return Err(Error::validation(
                "pricing.monthly_rent",
                "rent cannot be negative",
            ));
        }
        if self.deposit.is_sign_negative() {
            return Err(Error::validation(
                "pricing.deposit",
                "deposit cannot be negative",
            ));
        }
        if self.late_fee.is_sign_negative() {
            return Err(Error::validation(
                "pricing.late_fee",
                "late fee cannot be negative",
            ));
        }
        if !(1..=31).contains(&self.due_day) {
            return Err(Error::validation(
                "pricing.due_day",
                format!("due day {} is not a day of the month", self.due_day),
            ));
        }
        Ok(())
    }
}

/// Everything needed to render one rental contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDocument {
    pub contract_id: String,
    pub landlord: Party,
    pub tenant: Party,
    #[serde(default)]
    pub co_signer: Option<Party>,
    #[serde(default)]
    pub witness: Option<Party>,
    pub property: PropertyDescriptor,
    /// Missing pricing falls back to the configured defaults at render time.
    #[serde(default)]
    pub pricing: Option<PricingTerms>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// City where the contract is signed; defaults to the configured city.
    #[serde(default)]
    pub signing_city: Option<String>,
    #[serde(default)]
    pub additional_clauses: Vec<String>,
}

impl ContractDocument {
    /// Check the fields the renderer cannot substitute with placeholders.
    pub fn validate(&self) -> Result<()> {
        if self.contract_id.trim().is_empty() {
            return Err(Error::validation("contract_id", "contract id is required"));
        }

        self.landlord.validate("landlord")?;
        self.tenant.validate("tenant")?;

        if self.property.address.trim().is_empty() {
            return Err(Error::validation(
                "property.address",
                "property address is required",
            ));
        }
        if self.property.city.trim().is_empty() {
            return Err(Error::validation("property.city", "city is required"));
        }

        if self.end_date <= self.start_date {
            return Err(Error::validation(
                "end_date",
                format!(
                    "lease ends ({}) before it starts ({})",
                    self.end_date, self.start_date
                ),
            ));
        }

        if let Some(pricing) = &self.pricing {
            pricing.validate()?;
        }

        Ok(())
    }

    /// Find the party whose email matches, used to name the signer.
    pub fn party_by_email(&self, email: &str) -> Option<&Party> {
        [
            Some(&self.tenant),
            Some(&self.landlord),
            self.co_signer.as_ref(),
            self.witness.as_ref(),
        ]
        .into_iter()
        .flatten()
        .find(|p| {
            p.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        })
    }

    /// Whole months between start and end date.
    pub fn duration_months(&self) -> u32 {
        use chrono::Datelike;

        let mut months = (self.end_date.year() - self.start_date.year()) * 12
            + self.end_date.month() as i32
            - self.start_date.month() as i32;
        if self.end_date.day() < self.start_date.day() {
            months -= 1;
        }
        months.max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_contract;

    #[test]
    fn test_valid_contract() {
        assert!(sample_contract().validate().is_ok());
    }

    #[test]
    fn test_missing_tenant_name() {
        let mut contract = sample_contract();
        contract.tenant.full_name = "  ".to_string();

        match contract.validate() {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "tenant.full_name"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_end_before_start() {
        let mut contract = sample_contract();
        contract.end_date = contract.start_date;
        assert!(matches!(
            contract.validate(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_due_day() {
        let mut contract = sample_contract();
        if let Some(pricing) = contract.pricing.as_mut() {
            pricing.due_day = 0;
        }
        assert!(contract.validate().is_err());
    }

    #[test]
    fn test_missing_pricing_is_allowed() {
        let mut contract = sample_contract();
        contract.pricing = None;
        assert!(contract.validate().is_ok());
    }

    #[test]
    fn test_duration_months() {
        let mut contract = sample_contract();
        assert_eq!(contract.duration_months(), 12);

        contract.end_date = NaiveDate::from_ymd_opt(2027, 4, 30).unwrap();
        assert_eq!(contract.duration_months(), 5);
    }

    #[test]
    fn test_party_by_email_is_case_insensitive() {
        let contract = sample_contract();
        let party = contract.party_by_email("ANDRES@example.com").unwrap();
        assert_eq!(party.full_name, "Andrés Gómez");
        assert!(contract.party_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "contract_id": "C9",
            "landlord": {"full_name": "A", "id_number": "1"},
            "tenant": {"full_name": "B", "id_number": "2"},
            "property": {"address": "Calle 1", "city": "Cali"},
            "start_date": "2026-01-01",
            "end_date": "2026-07-01"
        }"#;
        let contract: ContractDocument = serde_json::from_str(json).unwrap();
        assert!(contract.pricing.is_none());
        assert!(contract.witness.is_none());
        assert_eq!(contract.property.property_type, "inmueble");
        assert!(contract.additional_clauses.is_empty());
    }
}
