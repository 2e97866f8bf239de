//! Error types
//!
//! Configuration errors are fatal and abort a run. Price and field errors
//! are recovered per fragment by the pipeline.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse {what} JSON: {message}")]
    Json { what: &'static str, message: String },

    #[error("No vendors configured")]
    NoVendors,

    #[error("Required selector `listings` not defined in {vendor} configuration")]
    MissingListingsSelector { vendor: String },

    #[error("`listings` selector in {vendor} configuration should be a string")]
    ListingsSelectorNotString { vendor: String },

    #[error("Invalid CSS selector for field `{field}` in {vendor}: {selector}")]
    InvalidSelector {
        vendor: String,
        field: String,
        selector: String,
    },

    #[error("Field `{field}` in {vendor} has unknown type `{kind}`")]
    UnknownFieldKind {
        vendor: String,
        field: String,
        kind: String,
    },

    #[error("Field `{field}` in {vendor} is malformed: {reason}")]
    MalformedField {
        vendor: String,
        field: String,
        reason: String,
    },

    #[error("Query `{content}`: {side} operator must be and/or/xor, received `{operator}`")]
    UnknownOperator {
        content: String,
        side: &'static str,
        operator: String,
    },

    #[error("Constructed URL {url} is not valid, check {vendor} configuration")]
    InvalidSearchUrl { vendor: String, url: String },

    #[error("Invalid page URL: {0}")]
    InvalidPageUrl(String),
}

impl ConfigError {
    pub(crate) fn json(what: &'static str, err: serde_json::Error) -> Self {
        Self::Json {
            what,
            message: err.to_string(),
        }
    }
}

/// Raised when no numeral can be recovered from price text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No price found in `{text}`")]
pub struct PriceParseError {
    pub text: String,
}

/// A price-kind field whose text could not be normalised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field `{field}`: {source}")]
pub struct FieldPriceError {
    pub field: String,
    #[source]
    pub source: PriceParseError,
}
