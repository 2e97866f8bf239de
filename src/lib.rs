//! Vendor listing parser
//!
//! Extracts product listings from rendered vendor search pages and filters
//! them against a query:
//! - Vendor schemas map CSS selectors to typed fields (text, links, prices)
//! - Free-form price text is normalised to numbers
//! - Queries apply include/exclude phrase logic and a price range
//! - Accepted listings are ranked by price with low/mean statistics
//!
//! Fetching pages is left to the host; see `ffi` for the C interface.

pub mod aggregate;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod logging;
pub mod pipeline;
pub mod price;
pub mod query;
pub mod report;
pub mod schema;

pub use aggregate::{aggregate, cost_per_frame, cost_per_frames, CostPerFrame, Listing, ResultSet};
pub use error::{ConfigError, FieldPriceError, PriceParseError};
pub use extractors::{Extraction, FieldValue, MissingField};
pub use pipeline::{search, ListingPipeline, Page, RunStats, SearchReport};
pub use query::{MatchResult, Operator, Query, QueryList, QuerySpec, Rejection};
pub use report::{ChannelReporter, FaultEvent, FaultKind, FaultReporter, MemoryReporter, TracingReporter};
pub use schema::{FieldKind, FieldSelector, VendorRegistry, VendorSchema};
