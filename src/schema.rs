//! Vendor schemas
//!
//! A vendor is declared as JSON: a search URL template, a `listings`
//! locator for the repeating listing fragment, and one selector per field.
//! Selectors are compiled once here so a bad locator fails the whole
//! configuration instead of silently matching nothing later.

use indexmap::IndexMap;
use scraper::Selector;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::error::ConfigError;

/// Name of the selector that locates each listing fragment.
pub const LISTINGS_FIELD: &str = "listings";

/// How a field's matched element is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Link,
    Image,
    Price,
    MiscPrice,
    AdditivePrice,
}

impl FieldKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Self::Text),
            "link" => Some(Self::Link),
            "image" => Some(Self::Image),
            "price" => Some(Self::Price),
            "misc_price" => Some(Self::MiscPrice),
            "additive_price" => Some(Self::AdditivePrice),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Link => "link",
            Self::Image => "image",
            Self::Price => "price",
            Self::MiscPrice => "misc_price",
            Self::AdditivePrice => "additive_price",
        }
    }
}

/// A compiled CSS selector together with its source text.
#[derive(Debug, Clone)]
pub struct Locator {
    source: String,
    selector: Selector,
}

impl Locator {
    pub fn parse(source: &str) -> Option<Self> {
        let selector = Selector::parse(source).ok()?;
        Some(Self {
            source: source.to_string(),
            selector,
        })
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub locator: Locator,
    pub kind: FieldKind,
    pub required: bool,
}

/// Search URL built as `start + encoded term + end`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UrlTemplate {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
struct RawVendor {
    #[serde(default)]
    metadata: Value,
    url: UrlTemplate,
    #[serde(default)]
    preload: Option<String>,
    #[serde(default)]
    strip_phrases: Vec<String>,
    selectors: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawFieldSelector {
    css_selector: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Clone)]
pub struct VendorSchema {
    identifier: String,
    metadata: Value,
    url: UrlTemplate,
    preload: Option<String>,
    strip_phrases: Vec<String>,
    listings: Locator,
    fields: IndexMap<String, FieldSelector>,
}

impl VendorSchema {
    /// Parse a single vendor body (the value under its identifier).
    pub fn from_json(identifier: &str, json: &str) -> Result<Self, ConfigError> {
        let raw: RawVendor =
            serde_json::from_str(json).map_err(|e| ConfigError::json("vendor", e))?;
        Self::from_raw(identifier, raw)
    }

    /// Build from an already parsed vendor body. Selector order follows the
    /// object's key order, so `serde_json` must keep insertion order.
    pub fn from_value(identifier: &str, value: Value) -> Result<Self, ConfigError> {
        let raw: RawVendor =
            serde_json::from_value(value).map_err(|e| ConfigError::json("vendor", e))?;
        Self::from_raw(identifier, raw)
    }

    fn from_raw(identifier: &str, raw: RawVendor) -> Result<Self, ConfigError> {
        let mut listings = None;
        let mut fields = IndexMap::new();

        for (name, spec) in raw.selectors {
            if name == LISTINGS_FIELD {
                let source = spec.as_str().ok_or_else(|| ConfigError::ListingsSelectorNotString {
                    vendor: identifier.to_string(),
                })?;
                listings = Some(compile(identifier, &name, source)?);
                continue;
            }

            let raw_field: RawFieldSelector =
                serde_json::from_value(spec).map_err(|e| ConfigError::MalformedField {
                    vendor: identifier.to_string(),
                    field: name.clone(),
                    reason: e.to_string(),
                })?;
            let kind = FieldKind::parse(&raw_field.kind).ok_or_else(|| ConfigError::UnknownFieldKind {
                vendor: identifier.to_string(),
                field: name.clone(),
                kind: raw_field.kind.clone(),
            })?;
            let locator = compile(identifier, &name, &raw_field.css_selector)?;

            fields.insert(
                name,
                FieldSelector {
                    locator,
                    kind,
                    required: raw_field.required,
                },
            );
        }

        let listings = listings.ok_or_else(|| ConfigError::MissingListingsSelector {
            vendor: identifier.to_string(),
        })?;

        Ok(Self {
            identifier: identifier.to_string(),
            metadata: raw.metadata,
            url: raw.url,
            preload: raw.preload,
            strip_phrases: raw.strip_phrases,
            listings,
            fields,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn preload(&self) -> Option<&str> {
        self.preload.as_deref()
    }

    pub fn strip_phrases(&self) -> &[String] {
        &self.strip_phrases
    }

    pub fn listings(&self) -> &Locator {
        &self.listings
    }

    /// Data fields in declaration order, `listings` excluded.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSelector)> {
        self.fields.iter().map(|(name, sel)| (name.as_str(), sel))
    }

    /// Build the search page URL for a query term.
    pub fn search_url(&self, term: &str) -> Result<Url, ConfigError> {
        let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let target = format!("{}{}{}", self.url.start, encoded, self.url.end);

        let invalid = || ConfigError::InvalidSearchUrl {
            vendor: self.identifier.clone(),
            url: target.clone(),
        };
        let parsed = Url::parse(&target).map_err(|_| invalid())?;
        if parsed.host_str().is_none() {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

fn compile(vendor: &str, field: &str, source: &str) -> Result<Locator, ConfigError> {
    Locator::parse(source).ok_or_else(|| ConfigError::InvalidSelector {
        vendor: vendor.to_string(),
        field: field.to_string(),
        selector: source.to_string(),
    })
}

/// All configured vendors, in declaration order.
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    vendors: Vec<VendorSchema>,
}

impl VendorRegistry {
    /// Parse a `{ "<identifier>": { ...vendor... } }` document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: IndexMap<String, Value> =
            serde_json::from_str(json).map_err(|e| ConfigError::json("vendors", e))?;
        if raw.is_empty() {
            return Err(ConfigError::NoVendors);
        }

        let vendors = raw
            .into_iter()
            .map(|(id, body)| VendorSchema::from_value(&id, body))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            count = vendors.len(),
            vendors = ?vendors.iter().map(VendorSchema::identifier).collect::<Vec<_>>(),
            "Loaded vendors"
        );
        Ok(Self { vendors })
    }

    pub fn find(&self, identifier: &str) -> Option<&VendorSchema> {
        self.vendors.iter().find(|v| v.identifier == identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.vendors.iter().map(VendorSchema::identifier)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}
