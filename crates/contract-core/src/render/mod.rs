//! Contract rendering.
//!
//! Turns a [`ContractDocument`] into PDF bytes: title block, header table,
//! numbered clauses and the signature block. Rendering is deterministic: the
//! same contract and defaults always produce the same bytes, which the signer
//! relies on when it re-renders a document to sign it.

pub mod clauses;
pub mod layout;
pub mod text;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::{amount_in_words, format_currency, long_date, number_to_words};
use crate::types::{ContractDocument, Party, PricingTerms};
use crate::Result;
use layout::{Cell, Layout, Style, CONTENT_WIDTH};
pub use text::normalize_text;

const TITLE_STYLE: Style = Style::bold(14);
const HEADING_STYLE: Style = Style::bold(10);
const BODY_STYLE: Style = Style::regular(10);
const SMALL_STYLE: Style = Style::regular(9);
const LABEL_COLUMN: i64 = 160;

/// Values used where the contract leaves optional data out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Printed in place of every field of an absent party.
    pub placeholder: String,
    /// Pricing used when the contract has none.
    pub pricing: PricingTerms,
    /// City of signing when the contract does not name one.
    pub signing_city: String,
    pub title: String,
    /// Written to the PDF `/Producer` entry.
    pub producer: String,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            placeholder: "NA".to_string(),
            pricing: PricingTerms {
                monthly_rent: Decimal::ZERO,
                deposit: Decimal::ZERO,
                due_day: 5,
                late_fee: Decimal::ZERO,
            },
            signing_city: "Bogotá D.C.".to_string(),
            title: "CONTRATO DE ARRENDAMIENTO DE VIVIENDA URBANA".to_string(),
            producer: "contract-signing".to_string(),
        }
    }
}

/// A party with every field resolved to printable text.
#[derive(Debug, Clone)]
pub struct ResolvedParty {
    pub full_name: String,
    pub id_number: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl ResolvedParty {
    fn new(party: Option<&Party>, placeholder: &str) -> Self {
        let or_placeholder = |value: Option<&String>| {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(placeholder)
                .to_string()
        };

        match party {
            Some(p) => Self {
                full_name: p.full_name.trim().to_string(),
                id_number: p.id_number.trim().to_string(),
                phone: or_placeholder(p.phone.as_ref()),
                email: or_placeholder(p.email.as_ref()),
                address: or_placeholder(p.address.as_ref()),
            },
            None => Self {
                full_name: placeholder.to_string(),
                id_number: placeholder.to_string(),
                phone: placeholder.to_string(),
                email: placeholder.to_string(),
                address: placeholder.to_string(),
            },
        }
    }
}

/// Every value a clause or table cell can print.
#[derive(Debug, Clone)]
pub struct Terms {
    pub landlord: ResolvedParty,
    pub tenant: ResolvedParty,
    pub co_signer: ResolvedParty,
    pub witness: ResolvedParty,
    pub property_type: String,
    pub property_address: String,
    pub city: String,
    pub registration_number: String,
    pub rent_amount: String,
    pub rent_words: String,
    pub deposit_amount: String,
    pub deposit_words: String,
    pub late_fee_amount: String,
    pub late_fee_words: String,
    pub due_day: u8,
    pub due_day_words: String,
    pub start_date: String,
    pub end_date: String,
    pub months: u32,
    pub months_words: String,
    pub signing_city: String,
}

impl Terms {
    fn resolve(contract: &ContractDocument, defaults: &RenderDefaults) -> Self {
        let placeholder = defaults.placeholder.as_str();
        let pricing = contract.pricing.as_ref().unwrap_or(&defaults.pricing);
        let months = contract.duration_months();

        Self {
            landlord: ResolvedParty::new(Some(&contract.landlord), placeholder),
            tenant: ResolvedParty::new(Some(&contract.tenant), placeholder),
            co_signer: ResolvedParty::new(contract.co_signer.as_ref(), placeholder),
            witness: ResolvedParty::new(contract.witness.as_ref(), placeholder),
            property_type: contract.property.property_type.clone(),
            property_address: contract.property.address.clone(),
            city: contract.property.city.clone(),
            registration_number: contract
                .property
                .registration_number
                .clone()
                .unwrap_or_else(|| placeholder.to_string()),
            rent_amount: format_currency(pricing.monthly_rent),
            rent_words: amount_in_words(pricing.monthly_rent).to_uppercase(),
            deposit_amount: format_currency(pricing.deposit),
            deposit_words: amount_in_words(pricing.deposit).to_uppercase(),
            late_fee_amount: format_currency(pricing.late_fee),
            late_fee_words: amount_in_words(pricing.late_fee).to_uppercase(),
            due_day: pricing.due_day,
            due_day_words: number_to_words(pricing.due_day as i64),
            start_date: long_date(contract.start_date),
            end_date: long_date(contract.end_date),
            months,
            months_words: number_to_words(months as i64),
            signing_city: contract
                .signing_city
                .clone()
                .unwrap_or_else(|| defaults.signing_city.clone()),
        }
    }
}

/// Renders contracts to PDF bytes.
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer {
    defaults: RenderDefaults,
}

impl DocumentRenderer {
    pub fn new(defaults: RenderDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RenderDefaults {
        &self.defaults
    }

    /// Render a contract. Fails only on missing required data; absent optional
    /// parties and pricing fall back to the defaults.
    pub fn render(&self, contract: &ContractDocument) -> Result<Vec<u8>> {
        contract.validate()?;
        let terms = Terms::resolve(contract, &self.defaults);
        let n = |s: &str| normalize_text(s);

        let mut layout = Layout::new();

        // Title block
        layout.centered(TITLE_STYLE, &n(&self.defaults.title));
        layout.centered(
            BODY_STYLE,
            &n(&format!("Contrato No. {}", contract.contract_id)),
        );
        layout.skip(12);

        // Header table
        for (label, value) in header_rows(&terms) {
            let value_width = CONTENT_WIDTH - LABEL_COLUMN;
            let label_lines = HEADING_STYLE.wrap(&n(label), LABEL_COLUMN - 8);
            let value_lines = BODY_STYLE.wrap(&n(&value), value_width - 8);
            layout.table_row(
                &[LABEL_COLUMN, value_width],
                &[
                    Cell {
                        lines: label_lines.into_iter().map(|l| (HEADING_STYLE, l)).collect(),
                    },
                    Cell {
                        lines: value_lines.into_iter().map(|l| (BODY_STYLE, l)).collect(),
                    },
                ],
            );
        }
        layout.skip(12);

        layout.paragraph(
            BODY_STYLE,
            &n("Entre las partes arriba identificadas se celebra el presente contrato de \
                arrendamiento, que se regirá por las siguientes cláusulas:"),
        );

        // Clauses
        for (i, clause) in clauses::clauses(&terms, &contract.additional_clauses)
            .iter()
            .enumerate()
        {
            layout.skip(6);
            layout.paragraph(
                HEADING_STYLE,
                &n(&format!("{}. {}.", clauses::ordinal(i + 1), clause.title)),
            );
            layout.paragraph(BODY_STYLE, &n(&clause.body));
        }

        // Signature block
        layout.skip(12);
        layout.paragraph(
            BODY_STYLE,
            &n(&format!(
                "En constancia se firma en {} por quienes en él intervienen.",
                terms.signing_city
            )),
        );
        layout.skip(6);
        layout.signature_row(&[
            signature_column("EL ARRENDADOR", &terms.landlord),
            signature_column("EL ARRENDATARIO", &terms.tenant),
        ]);
        layout.signature_row(&[
            signature_column("TESTIGO", &terms.witness),
            signature_column("DEUDOR SOLIDARIO", &terms.co_signer),
        ]);

        let bytes = layout.finish(
            &n(&self.defaults.title),
            &n(&contract.contract_id),
            &n(&self.defaults.producer),
        )?;

        debug!(
            contract_id = %contract.contract_id,
            size = bytes.len(),
            "Rendered contract document"
        );
        Ok(bytes)
    }
}

fn header_rows(t: &Terms) -> Vec<(&'static str, String)> {
    vec![
        (
            "Arrendador",
            format!("{} - Doc. {}", t.landlord.full_name, t.landlord.id_number),
        ),
        (
            "Arrendatario",
            format!("{} - Doc. {}", t.tenant.full_name, t.tenant.id_number),
        ),
        (
            "Deudor solidario",
            format!("{} - Doc. {}", t.co_signer.full_name, t.co_signer.id_number),
        ),
        (
            "Inmueble",
            format!("{} - {}", t.property_type, t.property_address),
        ),
        ("Ciudad", t.city.clone()),
        (
            "Canon mensual",
            format!("{} ({} PESOS M/CTE)", t.rent_amount, t.rent_words),
        ),
        ("Depósito", t.deposit_amount.clone()),
        ("Día de pago", format!("{} de cada mes", t.due_day)),
        ("Fecha de inicio", t.start_date.clone()),
        ("Fecha de terminación", t.end_date.clone()),
        ("Duración", format!("{} meses", t.months)),
        ("Lugar de celebración", t.signing_city.clone()),
    ]
}

fn signature_column(role: &str, party: &ResolvedParty) -> Vec<(Style, String)> {
    vec![
        (HEADING_STYLE, normalize_text(&party.full_name)),
        (SMALL_STYLE, normalize_text(&format!("Doc. {}", party.id_number))),
        (SMALL_STYLE, normalize_text(&format!("Tel. {}", party.phone))),
        (SMALL_STYLE, normalize_text(&format!("Email {}", party.email))),
        (HEADING_STYLE, role.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_contract;
    use crate::Error;
    use lopdf::content::Content;
    use lopdf::{Document, Object};

    /// Every `Tj` string of every page, one per line.
    fn page_text(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let mut text = String::new();
        for page_id in doc.get_pages().values() {
            let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
            for op in content.operations.iter().filter(|op| op.operator == "Tj") {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    text.push_str(&String::from_utf8_lossy(bytes));
                    text.push('\n');
                }
            }
        }
        text
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = DocumentRenderer::default();
        let contract = sample_contract();
        let first = renderer.render(&contract).unwrap();
        let second = renderer.render(&contract).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_render_is_ascii_only() {
        let renderer = DocumentRenderer::default();
        let bytes = renderer.render(&sample_contract()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        for page_id in doc.get_pages().values() {
            let content = doc.get_page_content(*page_id).unwrap();
            assert!(content.is_ascii());
        }
    }

    #[test]
    fn test_render_contains_terms() {
        let renderer = DocumentRenderer::default();
        let text = page_text(&renderer.render(&sample_contract()).unwrap());
        assert!(text.contains("Maria Jose Pena"));
        assert!(text.contains("$1,600,000.00"));
        assert!(text.contains("MILLON"));
        assert!(text.contains("SEISCIENTOS"));
        assert!(text.contains("1 de noviembre de 2026"));
        assert!(text.contains("CLAUSULA ADICIONAL"));
    }

    #[test]
    fn test_absent_parties_use_placeholder() {
        let defaults = RenderDefaults {
            placeholder: "NO APLICA".to_string(),
            ..Default::default()
        };
        let renderer = DocumentRenderer::new(defaults);
        let text = page_text(&renderer.render(&sample_contract()).unwrap());
        assert!(text.contains("NO APLICA"));
    }

    #[test]
    fn test_missing_pricing_uses_defaults() {
        let mut contract = sample_contract();
        contract.pricing = None;

        let renderer = DocumentRenderer::default();
        let text = page_text(&renderer.render(&contract).unwrap());
        assert!(text.contains("$0.00"));
        assert!(text.contains("CERO PESOS"));
    }

    #[test]
    fn test_render_rejects_missing_landlord() {
        let mut contract = sample_contract();
        contract.landlord.full_name.clear();

        let err = DocumentRenderer::default().render(&contract).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_different_contracts_render_differently() {
        let renderer = DocumentRenderer::default();
        let mut other = sample_contract();
        other.contract_id = "C2".to_string();
        assert_ne!(
            renderer.render(&sample_contract()).unwrap(),
            renderer.render(&other).unwrap()
        );
    }

    #[test]
    fn test_long_contract_spans_pages() {
        let mut contract = sample_contract();
        contract.additional_clauses = (0..40)
            .map(|i| format!("Cláusula adicional número {} con texto de relleno suficiente.", i))
            .collect();

        let bytes = DocumentRenderer::default().render(&contract).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }
}
