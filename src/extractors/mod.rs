//! HTML extraction
//!
//! `css` holds the fragment-scoped selector reads, `fields` turns a vendor
//! schema into typed values for one listing fragment.

mod css;
mod fields;

pub use css::{first_attr, first_text, resolve_url, select_all};
pub use fields::{extract, Extraction, FieldValue, MissingField, PriceSlots};
