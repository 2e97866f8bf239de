//! Listing pipeline
//!
//! One run covers one (vendor, query, page) triple: locate listing
//! fragments, extract each one, price it, match it against the query and
//! hand the survivors to the aggregator. Per-fragment failures drop that
//! fragment only.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::aggregate::{aggregate, Listing, ResultSet};
use crate::error::ConfigError;
use crate::extractors::{extract, select_all};
use crate::query::{MatchResult, Query};
use crate::report::{FaultEvent, FaultKind, FaultReporter};
use crate::schema::VendorSchema;

/// A parsed page and the URL it was loaded from.
#[derive(Debug)]
pub struct Page {
    document: Html,
    url: Url,
}

impl Page {
    pub fn parse(html: &str, url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|_| ConfigError::InvalidPageUrl(url.to_string()))?;
        Ok(Self::new(Html::parse_document(html), url))
    }

    pub fn new(document: Html, url: Url) -> Self {
        Self { document, url }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Fragment counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub located: usize,
    pub missing_required: usize,
    pub unpriced: usize,
    pub mismatched: usize,
    pub accepted: usize,
}

pub struct ListingPipeline<'a> {
    schema: &'a VendorSchema,
    query: &'a Query,
    reporter: &'a dyn FaultReporter,
}

impl<'a> ListingPipeline<'a> {
    pub fn new(schema: &'a VendorSchema, query: &'a Query, reporter: &'a dyn FaultReporter) -> Self {
        Self {
            schema,
            query,
            reporter,
        }
    }

    pub fn run(&self, page: &Page) -> ResultSet {
        self.run_with_stats(page).0
    }

    pub fn run_with_stats(&self, page: &Page) -> (ResultSet, RunStats) {
        let vendor = self.schema.identifier();
        let content = self.query.content();
        let mut stats = RunStats::default();

        let fragments = select_all(page.document(), self.schema.listings().selector());
        stats.located = fragments.len();
        if fragments.is_empty() {
            info!(vendor, query = content, "No listings located");
            return (ResultSet::empty(), stats);
        }

        let mut accepted = Vec::new();
        for (index, fragment) in fragments.into_iter().enumerate() {
            let extraction = extract(fragment, self.schema, page.url());

            if !extraction.missing.is_empty() {
                stats.missing_required += 1;
                let fields = extraction.missing.into_iter().map(|m| m.field).collect();
                self.reporter.report(FaultEvent::new(
                    vendor,
                    content,
                    index,
                    FaultKind::MissingRequiredField {
                        fields,
                        fragment_html: fragment.html(),
                    },
                ));
                continue;
            }

            let Some(price) = extraction.prices.effective() else {
                stats.unpriced += 1;
                debug!(vendor, index, "Dropped listing without a price");
                continue;
            };

            match self.query.matches(&extraction.searchable_text(), price) {
                MatchResult::Accepted => {
                    stats.accepted += 1;
                    accepted.push(Listing::new(extraction.fields, price));
                }
                MatchResult::Rejected(reason) => {
                    stats.mismatched += 1;
                    self.reporter.report(FaultEvent::new(
                        vendor,
                        content,
                        index,
                        FaultKind::QueryMismatch { reason },
                    ));
                }
            }
        }

        info!(
            vendor,
            query = content,
            located = stats.located,
            accepted = stats.accepted,
            missing_required = stats.missing_required,
            unpriced = stats.unpriced,
            mismatched = stats.mismatched,
            "Listings filtered"
        );
        (aggregate(accepted, self.schema.strip_phrases()), stats)
    }
}

/// Result sets keyed by query content, bracketed by run timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub time_start: DateTime<Utc>,
    #[serde(flatten)]
    pub results: IndexMap<String, ResultSet>,
    pub time_end: DateTime<Utc>,
}

impl SearchReport {
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            time_start: now,
            results: IndexMap::new(),
            time_end: now,
        }
    }

    pub fn record(&mut self, query: &Query, result: ResultSet) {
        self.results.insert(query.content().to_string(), result);
        self.time_end = Utc::now();
    }
}

/// Parse `html` loaded from `page_url` and run one pipeline over it.
pub fn search(
    schema: &VendorSchema,
    query: &Query,
    html: &str,
    page_url: &str,
    reporter: &dyn FaultReporter,
) -> Result<ResultSet, ConfigError> {
    let page = Page::parse(html, page_url)?;
    Ok(ListingPipeline::new(schema, query, reporter).run(&page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Rejection;
    use crate::report::MemoryReporter;

    fn schema() -> VendorSchema {
        VendorSchema::from_json(
            "shop",
            r#"{
                "url": {"start": "https://shop.example/search?q=", "end": ""},
                "strip_phrases": [" - Ships Free"],
                "selectors": {
                    "listings": "li.result",
                    "title": {"css_selector": "h3", "type": "text", "required": true},
                    "url": {"css_selector": "a", "type": "link"},
                    "price": {"css_selector": ".price", "type": "price"},
                    "shipping": {"css_selector": ".ship", "type": "additive_price"}
                }
            }"#,
        )
        .unwrap()
    }

    const PAGE: &str = r#"
        <ul>
            <li class="result"><h3>RTX 4090 - Ships Free</h3><a href="/a">a</a><span class="price">$1,100.00</span></li>
            <li class="result"><a href="/b">b</a><span class="price">$900.00</span></li>
            <li class="result"><h3>RTX 4090 Refurb</h3><span class="price">$800.00</span></li>
            <li class="result"><h3>RTX 4090</h3><span class="price">Sold out</span></li>
            <li class="result"><h3>GTX 1080</h3><span class="price">$300.00</span></li>
            <li class="result"><h3>RTX 4090 OC</h3><span class="price">$1,000.00</span><span class="ship">+$50.00</span></li>
        </ul>
    "#;

    #[test]
    fn test_run_drops_and_reports() {
        let schema = schema();
        let query = Query::from_json(r#"{"Content": "RTX 4090", "Exclude": ["refurb"]}"#).unwrap();
        let reporter = MemoryReporter::new();
        let page = Page::parse(PAGE, "https://shop.example/search?q=RTX+4090").unwrap();

        let (result, stats) = ListingPipeline::new(&schema, &query, &reporter).run_with_stats(&page);

        assert_eq!(
            stats,
            RunStats {
                located: 6,
                missing_required: 1,
                unpriced: 1,
                mismatched: 2,
                accepted: 2,
            }
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.low, Some(1050.0));
        assert_eq!(result.mean, Some(1075.0));

        let first = &result.listings[0];
        assert_eq!(first.price(), 1050.0);
        assert!(first.get("shipping").is_none());
        let second = &result.listings[1];
        assert_eq!(second.get("title").and_then(|v| v.as_text()), Some("RTX 4090"));
        assert_eq!(
            second.get("url"),
            Some(&crate::extractors::FieldValue::Url("https://shop.example/a".into()))
        );

        let events = reporter.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0].kind,
            FaultKind::MissingRequiredField { fields, fragment_html }
                if fields == &["title".to_string()] && fragment_html.contains("$900.00")
        ));
        assert_eq!(events[0].index, 1);
        assert_eq!(
            events[1].kind,
            FaultKind::QueryMismatch {
                reason: Rejection::PhrasesFound(vec!["refurb".into()])
            }
        );
        assert!(matches!(
            &events[2].kind,
            FaultKind::QueryMismatch { reason: Rejection::PhrasesNotFound(missing) }
                if missing == &["rtx 4090".to_string()]
        ));
    }

    #[test]
    fn test_no_fragments() {
        let schema = schema();
        let query = Query::from_json(r#"{"Content": "RTX 4090"}"#).unwrap();
        let reporter = MemoryReporter::new();
        let result = search(&schema, &query, "<html><body></body></html>", "https://shop.example/", &reporter)
            .unwrap();
        assert_eq!(result, ResultSet::empty());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_bad_page_url() {
        let schema = schema();
        let query = Query::from_json(r#"{"Content": "RTX 4090"}"#).unwrap();
        let reporter = MemoryReporter::new();
        let err = search(&schema, &query, PAGE, "not a url", &reporter).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPageUrl("not a url".into()));
    }

    #[test]
    fn test_search_report() {
        let schema = schema();
        let query = Query::from_json(
            r#"{"Content": "RTX 4090", "Exclude": ["refurb"], "MaximumValue": 1060}"#,
        )
        .unwrap();
        let reporter = MemoryReporter::new();
        let result = search(&schema, &query, PAGE, "https://shop.example/", &reporter).unwrap();

        let mut report = SearchReport::start();
        report.record(&query, result);
        assert!(report.time_end >= report.time_start);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["time_start"].is_string());
        assert_eq!(json["RTX 4090"]["price (low)"], 1050.0);
        assert_eq!(json["RTX 4090"]["listings"].as_array().unwrap().len(), 1);
    }
}
