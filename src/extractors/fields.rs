//! Schema-driven field extraction for one listing fragment

use indexmap::IndexMap;
use scraper::ElementRef;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::css::{first_attr, first_text, resolve_url};
use crate::error::FieldPriceError;
use crate::price;
use crate::schema::{FieldKind, FieldSelector, VendorSchema};

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Url(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A required field whose selector resolved to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub field: String,
}

/// Price accumulators for one fragment. The authoritative slot is
/// overwritten by each `price` field, the additive slot only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceSlots {
    authoritative: Option<f64>,
    additive: f64,
}

impl PriceSlots {
    pub fn set_authoritative(&mut self, amount: f64) {
        self.authoritative = Some(amount);
    }

    pub fn add(&mut self, amount: f64) {
        self.additive += amount;
    }

    pub fn authoritative(&self) -> Option<f64> {
        self.authoritative
    }

    pub fn additive(&self) -> f64 {
        self.additive
    }

    /// Authoritative price plus every additive component, if priced at all.
    pub fn effective(&self) -> Option<f64> {
        self.authoritative.map(|p| p + self.additive)
    }
}

/// Everything pulled out of one fragment.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: IndexMap<String, FieldValue>,
    pub missing: Vec<MissingField>,
    pub price_errors: Vec<FieldPriceError>,
    pub prices: PriceSlots,
}

impl Extraction {
    /// Text fields joined by spaces, in schema order. URLs and numbers are
    /// left out.
    pub fn searchable_text(&self) -> String {
        self.fields
            .values()
            .filter_map(FieldValue::as_text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run every schema field against a fragment. `base` is the page URL used
/// to absolutise links and images.
pub fn extract(fragment: ElementRef<'_>, schema: &VendorSchema, base: &Url) -> Extraction {
    let mut out = Extraction::default();

    for (name, field) in schema.fields() {
        let present = match field.kind {
            FieldKind::Text => match first_text(fragment, field.locator.selector()) {
                Some(text) => {
                    out.fields.insert(name.to_string(), FieldValue::Text(text));
                    true
                }
                None => false,
            },
            FieldKind::Link => read_url(&mut out, fragment, name, field, "href", base),
            FieldKind::Image => read_url(&mut out, fragment, name, field, "src", base),
            FieldKind::Price => match read_price(&mut out, fragment, name, field) {
                Some(amount) => {
                    out.prices.set_authoritative(amount);
                    out.fields.insert(name.to_string(), FieldValue::Number(amount));
                    true
                }
                None => false,
            },
            FieldKind::MiscPrice => match read_price(&mut out, fragment, name, field) {
                Some(amount) => {
                    out.fields.insert(name.to_string(), FieldValue::Number(amount));
                    true
                }
                None => false,
            },
            FieldKind::AdditivePrice => match read_price(&mut out, fragment, name, field) {
                Some(amount) => {
                    out.prices.add(amount);
                    true
                }
                None => false,
            },
        };

        if !present && field.required {
            out.missing.push(MissingField {
                field: name.to_string(),
            });
        }
    }

    out
}

fn read_url(
    out: &mut Extraction,
    fragment: ElementRef<'_>,
    name: &str,
    field: &FieldSelector,
    attr: &str,
    base: &Url,
) -> bool {
    let resolved = first_attr(fragment, field.locator.selector(), attr)
        .and_then(|raw| resolve_url(base, &raw));
    match resolved {
        Some(url) => {
            out.fields.insert(name.to_string(), FieldValue::Url(url));
            true
        }
        None => false,
    }
}

fn read_price(
    out: &mut Extraction,
    fragment: ElementRef<'_>,
    name: &str,
    field: &FieldSelector,
) -> Option<f64> {
    let text = first_text(fragment, field.locator.selector())?;
    match price::normalize(&text) {
        Ok(amount) => Some(amount),
        Err(source) => {
            debug!(field = name, kind = field.kind.as_str(), %source, "Unparseable price");
            out.price_errors.push(FieldPriceError {
                field: name.to_string(),
                source,
            });
            None
        }
    }
}
