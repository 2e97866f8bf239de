//! Query matching
//!
//! A query decides whether one listing is kept: its effective price must
//! fall in `(minimum, maximum]` and its searchable text must satisfy the
//! include and exclude phrase rules.

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::error::ConfigError;

/// How per-phrase hits combine into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Xor,
}

impl Operator {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "xor" => Some(Self::Xor),
            _ => None,
        }
    }

    fn combine(self, found: usize, total: usize) -> bool {
        match self {
            Self::And => found == total,
            Self::Or => found > 0,
            Self::Xor => found == 1,
        }
    }
}

/// Query document as supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySpec {
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Include", default)]
    pub include: Vec<String>,
    #[serde(rename = "IncludeSettings", default)]
    pub include_settings: IncludeSettings,
    #[serde(rename = "Exclude", default)]
    pub exclude: Vec<String>,
    #[serde(rename = "ExcludeSettings", default)]
    pub exclude_settings: ExcludeSettings,
    #[serde(rename = "MinimumValue", default)]
    pub minimum: f64,
    #[serde(rename = "MaximumValue", default)]
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeSettings {
    #[serde(default = "default_true")]
    pub require_content: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_include_operator")]
    pub operator: String,
}

impl Default for IncludeSettings {
    fn default() -> Self {
        Self {
            require_content: true,
            case_sensitive: false,
            operator: default_include_operator(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExcludeSettings {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_exclude_operator")]
    pub operator: String,
}

impl Default for ExcludeSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            operator: default_exclude_operator(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_include_operator() -> String {
    "and".to_string()
}

fn default_exclude_operator() -> String {
    "or".to_string()
}

/// Why a listing was turned away.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Price: {price} not greater than MinimumValue of {minimum}")]
    BelowMinimum { price: f64, minimum: f64 },

    #[error("Price: {price} greater than MaximumValue of {maximum}")]
    AboveMaximum { price: f64, maximum: f64 },

    #[error("phrases_not_found : {0:?}")]
    PhrasesNotFound(Vec<String>),

    #[error("phrases_found : {0:?}")]
    PhrasesFound(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Accepted,
    Rejected(Rejection),
}

impl MatchResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug, Clone)]
struct PhraseFilter {
    phrases: Vec<String>,
    case_sensitive: bool,
    operator: Operator,
}

impl PhraseFilter {
    fn new(mut phrases: Vec<String>, case_sensitive: bool, operator: Operator) -> Self {
        if !case_sensitive {
            phrases = phrases.into_iter().map(|p| p.to_lowercase()).collect();
        }
        Self {
            phrases,
            case_sensitive,
            operator,
        }
    }

    fn fold(&self, text: &str) -> String {
        if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    content: String,
    include: PhraseFilter,
    exclude: PhraseFilter,
    minimum: f64,
    maximum: Option<f64>,
}

impl Query {
    /// Validate a query document. Operators are checked here so a bad one
    /// fails before any listing is looked at.
    pub fn new(spec: QuerySpec) -> Result<Self, ConfigError> {
        let include_op = parse_operator(&spec.content, "Include", &spec.include_settings.operator)?;
        let exclude_op = parse_operator(&spec.content, "Exclude", &spec.exclude_settings.operator)?;

        let mut include = spec.include;
        if spec.include_settings.require_content {
            include.push(spec.content.clone());
        }

        Ok(Self {
            include: PhraseFilter::new(include, spec.include_settings.case_sensitive, include_op),
            exclude: PhraseFilter::new(
                spec.exclude,
                spec.exclude_settings.case_sensitive,
                exclude_op,
            ),
            content: spec.content,
            minimum: spec.minimum,
            maximum: spec.maximum,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let spec: QuerySpec =
            serde_json::from_str(json).map_err(|e| ConfigError::json("query", e))?;
        Self::new(spec)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn include_phrases(&self) -> &[String] {
        &self.include.phrases
    }

    pub fn exclude_phrases(&self) -> &[String] {
        &self.exclude.phrases
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    /// Test one listing's searchable text and effective price.
    pub fn matches(&self, searchable: &str, price: f64) -> MatchResult {
        if let Err(rejection) = self.check_price(price) {
            return MatchResult::Rejected(rejection);
        }
        if let Err(rejection) = self.check_include(searchable) {
            return MatchResult::Rejected(rejection);
        }
        if let Err(rejection) = self.check_exclude(searchable) {
            return MatchResult::Rejected(rejection);
        }
        MatchResult::Accepted
    }

    fn check_price(&self, price: f64) -> Result<(), Rejection> {
        // Lower bound is strict, upper bound inclusive.
        if price <= self.minimum {
            return Err(Rejection::BelowMinimum {
                price,
                minimum: self.minimum,
            });
        }
        match self.maximum {
            Some(maximum) if price > maximum => Err(Rejection::AboveMaximum { price, maximum }),
            _ => Ok(()),
        }
    }

    fn check_include(&self, searchable: &str) -> Result<(), Rejection> {
        let filter = &self.include;
        if filter.phrases.is_empty() {
            return Ok(());
        }

        let haystack = filter.fold(searchable);
        let compact_haystack = strip_whitespace(&haystack);
        let content = self.content.to_lowercase();

        let (found, missing): (Vec<&String>, Vec<&String>) =
            filter.phrases.iter().partition(|phrase| {
                haystack.contains(phrase.as_str())
                    || (phrase.to_lowercase() == content
                        && compact_haystack.contains(&strip_whitespace(phrase)))
            });

        if filter.operator.combine(found.len(), filter.phrases.len()) {
            Ok(())
        } else {
            Err(Rejection::PhrasesNotFound(
                missing.into_iter().cloned().collect(),
            ))
        }
    }

    fn check_exclude(&self, searchable: &str) -> Result<(), Rejection> {
        let filter = &self.exclude;
        if filter.phrases.is_empty() {
            return Ok(());
        }

        let haystack = filter.fold(searchable);
        let found: Vec<String> = filter
            .phrases
            .iter()
            .filter(|phrase| haystack.contains(phrase.as_str()))
            .cloned()
            .collect();

        if filter.operator.combine(found.len(), filter.phrases.len()) {
            Err(Rejection::PhrasesFound(found))
        } else {
            Ok(())
        }
    }
}

fn parse_operator(content: &str, side: &'static str, value: &str) -> Result<Operator, ConfigError> {
    Operator::parse(value).ok_or_else(|| ConfigError::UnknownOperator {
        content: content.to_string(),
        side,
        operator: value.to_string(),
    })
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Default, Deserialize)]
struct QueryListSettings {
    #[serde(default)]
    filtered_phrases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQueryList {
    #[serde(default)]
    settings: QueryListSettings,
    queries: Vec<QuerySpec>,
}

/// A batch of queries sharing a global list of filtered phrases, with a
/// cursor for walking through them.
#[derive(Debug, Clone)]
pub struct QueryList {
    queries: Vec<Query>,
    pos: usize,
}

impl QueryList {
    /// Every query's Exclude list gets the global `filtered_phrases` appended.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawQueryList =
            serde_json::from_str(json).map_err(|e| ConfigError::json("query list", e))?;

        let queries = raw
            .queries
            .into_iter()
            .map(|mut spec| {
                spec.exclude
                    .extend(raw.settings.filtered_phrases.iter().cloned());
                Query::new(spec)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = queries.len(), "Loaded query list");
        Ok(Self { queries, pos: 0 })
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn current(&self) -> Option<&Query> {
        self.queries.get(self.pos)
    }

    /// Move to the next query; `None` once the list is exhausted.
    pub fn advance(&mut self) -> Option<&Query> {
        if self.pos < self.queries.len() {
            self.pos += 1;
        }
        self.current()
    }

    pub fn back(&mut self) -> Option<&Query> {
        self.pos = self.pos.saturating_sub(1);
        self.current()
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(json: &str) -> Query {
        Query::from_json(json).unwrap()
    }

    #[test]
    fn test_defaults_fold_content_into_include() {
        let q = query(r#"{"Content": "RTX 4090", "Include": ["Founders"]}"#);
        assert_eq!(q.include_phrases(), ["founders", "rtx 4090"]);
        assert!(q.exclude_phrases().is_empty());
        assert_eq!(q.minimum(), 0.0);
        assert_eq!(q.maximum(), None);

        let q = query(
            r#"{"Content": "RTX 4090", "IncludeSettings": {"require_content": false, "case_sensitive": true}}"#,
        );
        assert!(q.include_phrases().is_empty());
    }

    #[test]
    fn test_price_bounds() {
        let q = query(r#"{"Content": "gpu", "MinimumValue": 100, "MaximumValue": 500}"#);
        assert!(matches!(
            q.matches("gpu", 100.0),
            MatchResult::Rejected(Rejection::BelowMinimum { .. })
        ));
        assert!(q.matches("gpu", 100.01).is_accepted());
        assert!(q.matches("gpu", 500.0).is_accepted());
        assert!(matches!(
            q.matches("gpu", 500.01),
            MatchResult::Rejected(Rejection::AboveMaximum { .. })
        ));

        let unbounded = query(r#"{"Content": "gpu", "MaximumValue": null}"#);
        assert!(unbounded.matches("gpu", 1_000_000.0).is_accepted());
        assert!(!unbounded.matches("gpu", 0.0).is_accepted());
    }

    #[test]
    fn test_include_operators() {
        let and = query(r#"{"Content": "rtx", "Include": ["asus", "oc"]}"#);
        assert!(and.matches("ASUS RTX OC", 1.0).is_accepted());
        assert_eq!(
            and.matches("ASUS RTX", 1.0),
            MatchResult::Rejected(Rejection::PhrasesNotFound(vec!["oc".into()]))
        );

        let or = query(
            r#"{"Content": "rtx", "Include": ["asus", "msi"], "IncludeSettings": {"require_content": false, "operator": "OR"}}"#,
        );
        assert!(or.matches("MSI card", 1.0).is_accepted());
        assert!(!or.matches("Zotac card", 1.0).is_accepted());

        let xor = query(
            r#"{"Content": "rtx", "Include": ["asus", "msi"], "IncludeSettings": {"require_content": false, "operator": "xor"}}"#,
        );
        assert!(xor.matches("MSI card", 1.0).is_accepted());
        assert!(!xor.matches("MSI and ASUS bundle", 1.0).is_accepted());
        assert!(!xor.matches("Zotac", 1.0).is_accepted());
    }

    #[test]
    fn test_content_matches_regardless_of_spacing() {
        let q = query(r#"{"Content": "RTX 4090", "Include": ["gaming"]}"#);
        assert!(q.matches("GeForce RTX4090 Gaming OC", 1.0).is_accepted());

        // Only the content term gets the whitespace-insensitive pass.
        let q = query(r#"{"Content": "RTX 4090", "Include": ["gaming oc"]}"#);
        assert!(!q.matches("GeForce RTX 4090 GamingOC", 1.0).is_accepted());
    }

    #[test]
    fn test_case_sensitive_include() {
        let q = query(r#"{"Content": "RTX", "IncludeSettings": {"case_sensitive": true}}"#);
        assert!(q.matches("GeForce RTX", 1.0).is_accepted());
        assert!(!q.matches("geforce rtx", 1.0).is_accepted());
    }

    #[test]
    fn test_exclude_operators() {
        let or = query(r#"{"Content": "rtx", "Exclude": ["Open Box", "refurbished"]}"#);
        assert_eq!(
            or.matches("RTX 4090 Open Box", 1.0),
            MatchResult::Rejected(Rejection::PhrasesFound(vec!["open box".into()]))
        );
        assert!(or.matches("RTX 4090", 1.0).is_accepted());

        let and = query(
            r#"{"Content": "rtx", "Exclude": ["open box", "refurbished"], "ExcludeSettings": {"operator": "and"}}"#,
        );
        assert!(and.matches("RTX open box", 1.0).is_accepted());
        assert!(!and.matches("RTX open box refurbished", 1.0).is_accepted());

        let xor = query(
            r#"{"Content": "rtx", "Exclude": ["open box", "refurbished"], "ExcludeSettings": {"operator": "xor"}}"#,
        );
        assert!(!xor.matches("RTX open box", 1.0).is_accepted());
        assert!(xor.matches("RTX open box refurbished", 1.0).is_accepted());

        let sensitive = query(
            r#"{"Content": "rtx", "Exclude": ["Open Box"], "ExcludeSettings": {"case_sensitive": true}}"#,
        );
        assert!(sensitive.matches("RTX open box", 1.0).is_accepted());
        assert!(!sensitive.matches("RTX Open Box", 1.0).is_accepted());
    }

    #[test]
    fn test_empty_exclude_never_rejects() {
        for operator in ["and", "or", "xor"] {
            let q = query(&format!(
                r#"{{"Content": "rtx", "Exclude": [], "ExcludeSettings": {{"operator": "{operator}"}}}}"#
            ));
            assert!(q.exclude_phrases().is_empty());
            assert!(q.matches("RTX 4090", 1.0).is_accepted(), "{operator}");
            assert!(q.matches("rtx", 1.0).is_accepted(), "{operator}");
        }
    }

    #[test]
    fn test_unknown_operator_is_config_error() {
        let err = Query::from_json(r#"{"Content": "rtx", "IncludeSettings": {"operator": "nand"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator { side: "Include", .. }));

        let err = Query::from_json(r#"{"Content": "rtx", "ExcludeSettings": {"operator": ""}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator { side: "Exclude", .. }));
    }

    #[test]
    fn test_query_list() {
        let json = r#"{
            "settings": {"filtered_phrases": ["Bundle"]},
            "queries": [
                {"Content": "RTX 4090", "Exclude": ["open box"]},
                {"Content": "RTX 4080"}
            ]
        }"#;
        let mut list = QueryList::from_json(json).unwrap();
        assert_eq!(list.queries().len(), 2);
        assert_eq!(list.current().unwrap().exclude_phrases(), ["open box", "bundle"]);

        assert_eq!(list.advance().unwrap().content(), "RTX 4080");
        assert_eq!(list.current().unwrap().exclude_phrases(), ["bundle"]);
        assert!(list.advance().is_none());
        assert!(list.advance().is_none());
        assert_eq!(list.back().unwrap().content(), "RTX 4080");

        list.reset();
        assert_eq!(list.current().unwrap().content(), "RTX 4090");
        assert_eq!(list.back().unwrap().content(), "RTX 4090");
    }
}
