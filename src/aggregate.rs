//! Ranking and summary statistics over accepted listings

use indexmap::IndexMap;
use serde::Serialize;

use crate::extractors::FieldValue;

/// One accepted listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    #[serde(flatten)]
    fields: IndexMap<String, FieldValue>,
    effective_price: f64,
}

impl Listing {
    pub fn new(fields: IndexMap<String, FieldValue>, effective_price: f64) -> Self {
        Self {
            fields,
            effective_price,
        }
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Main price plus additive components.
    pub fn price(&self) -> f64 {
        self.effective_price
    }

    /// Remove every occurrence of each phrase from text fields, phrases
    /// applied in order.
    pub fn strip_phrases(&mut self, phrases: &[String]) {
        for value in self.fields.values_mut() {
            if let FieldValue::Text(text) = value {
                for phrase in phrases.iter().filter(|p| !p.is_empty()) {
                    if text.contains(phrase.as_str()) {
                        *text = text.replace(phrase.as_str(), "");
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    #[serde(rename = "price (low)")]
    pub low: Option<f64>,
    #[serde(rename = "price (mean)")]
    pub mean: Option<f64>,
    pub listings: Vec<Listing>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self {
            low: None,
            mean: None,
            listings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// Sort by effective price (ties keep document order), summarise, then
/// strip the vendor's cosmetic phrases.
pub fn aggregate(mut listings: Vec<Listing>, strip_phrases: &[String]) -> ResultSet {
    if listings.is_empty() {
        return ResultSet::empty();
    }

    listings.sort_by(|a, b| a.price().total_cmp(&b.price()));

    let low = listings[0].price();
    let total: f64 = listings.iter().map(Listing::price).sum();
    let mean = round_cents(total / listings.len() as f64);

    for listing in &mut listings {
        listing.strip_phrases(strip_phrases);
    }

    ResultSet {
        low: Some(low),
        mean: Some(mean),
        listings,
    }
}

/// Round half away from zero to 2 decimal places. The value is snapped to
/// 6 places first so binary noise like `1012.7449999` rounds as `1012.745`.
pub fn round_cents(value: f64) -> f64 {
    let micros = (value * 1_000_000.0).round();
    (micros / 10_000.0).round() / 100.0
}

/// A result set's prices divided by benchmark frame rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostPerFrame {
    #[serde(rename = "Cost Per Frames (price (low))")]
    pub low: IndexMap<String, f64>,
    #[serde(rename = "price (low)")]
    pub price_low: f64,
    #[serde(rename = "Cost Per Frames (price (mean))")]
    pub mean: IndexMap<String, f64>,
    #[serde(rename = "price (mean)")]
    pub price_mean: f64,
    pub listings: Vec<Listing>,
    pub performance: IndexMap<String, f64>,
}

/// Cost per frame at each resolution in `performance` (resolution -> FPS),
/// rounded to cents. `None` for a result set with no listings. Resolutions
/// without a positive frame rate are left out.
pub fn cost_per_frame(
    result: &ResultSet,
    performance: &IndexMap<String, f64>,
) -> Option<CostPerFrame> {
    let (price_low, price_mean) = result.low.zip(result.mean)?;

    let mut low = IndexMap::new();
    let mut mean = IndexMap::new();
    for (resolution, &fps) in performance {
        if !(fps.is_finite() && fps > 0.0) {
            continue;
        }
        low.insert(resolution.clone(), round_cents(price_low / fps));
        mean.insert(resolution.clone(), round_cents(price_mean / fps));
    }

    Some(CostPerFrame {
        low,
        price_low,
        mean,
        price_mean,
        listings: result.listings.clone(),
        performance: performance.clone(),
    })
}

/// [`cost_per_frame`] for every benchmarked product that also has priced
/// results, in benchmark order.
pub fn cost_per_frames(
    results: &IndexMap<String, ResultSet>,
    performance: &IndexMap<String, IndexMap<String, f64>>,
) -> IndexMap<String, CostPerFrame> {
    performance
        .iter()
        .filter_map(|(product, fps)| {
            let cost = cost_per_frame(results.get(product)?, fps)?;
            Some((product.clone(), cost))
        })
        .collect()
}
