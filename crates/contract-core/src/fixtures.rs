//! Sample contracts shared by tests and benchmarks.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::{ContractDocument, Party, PricingTerms, PropertyDescriptor};

pub fn sample_contract() -> ContractDocument {
    ContractDocument {
        contract_id: "C1".to_string(),
        landlord: Party::new("María José Peña", "52.123.456")
            .with_phone("3001234567")
            .with_email("maria@example.com")
            .with_address("Calle 10 # 5-20, Bogotá"),
        tenant: Party::new("Andrés Gómez", "80.987.654")
            .with_phone("3109876543")
            .with_email("andres@example.com"),
        co_signer: None,
        witness: None,
        property: PropertyDescriptor {
            address: "Carrera 7 # 45-12 Apto 301".to_string(),
            city: "Bogotá".to_string(),
            property_type: "apartamento".to_string(),
            registration_number: Some("50C-123456".to_string()),
        },
        pricing: Some(PricingTerms {
            monthly_rent: Decimal::new(1_600_000, 0),
            deposit: Decimal::new(1_600_000, 0),
            due_day: 5,
            late_fee: Decimal::new(50_000, 0),
        }),
        start_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2027, 11, 1).unwrap(),
        signing_city: None,
        additional_clauses: vec!["Se permiten mascotas pequeñas.".to_string()],
    }
}
