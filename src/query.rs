//! Client-side filtering, ranking, and derived stats over a raw offer set.
//!
//! Everything here is a pure function over immutable snapshots: the same
//! offers and the same [`FilterState`] always produce the same
//! [`FilterOutcome`]. Nothing is cached or patched; the caller recomputes
//! whenever either input changes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::models::FlightOffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopFilter {
    Any,
    NonStop,
    One,
    TwoPlus,
}

impl StopFilter {
    fn matches(self, stops: usize) -> bool {
        match self {
            StopFilter::Any => true,
            StopFilter::NonStop => stops == 0,
            StopFilter::One => stops == 1,
            StopFilter::TwoPlus => stops >= 2,
        }
    }
}

impl FromStr for StopFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "any" => Ok(StopFilter::Any),
            "0" => Ok(StopFilter::NonStop),
            "1" => Ok(StopFilter::One),
            "2+" => Ok(StopFilter::TwoPlus),
            other => Err(Error::InvalidSearch(format!("bad stop filter: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Cheapest,
    Fastest,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "cheapest" => Ok(SortOrder::Cheapest),
            "fastest" => Ok(SortOrder::Fastest),
            other => Err(Error::InvalidSearch(format!("bad sort order: {other}"))),
        }
    }
}

/// User-driven filter settings, alive for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub max_price: f64,
    /// Validating-airline codes to keep; empty means no restriction.
    pub airlines: Vec<String>,
    pub stops: StopFilter,
    pub sort_by: SortOrder,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            max_price: 2000.0,
            airlines: Vec::new(),
            stops: StopFilter::Any,
            sort_by: SortOrder::Cheapest,
        }
    }
}

/// Ids of the standout offers within a filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightStats {
    pub cheapest_id: String,
    pub fastest_id: String,
    pub best_value_id: String,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub offers: Vec<FlightOffer>,
    /// None when the filtered set is empty.
    pub stats: Option<FlightStats>,
}

/// Applies stops, price ceiling, and airline filters in that order, then
/// stable-sorts by the selected order and computes stats over the survivors.
pub fn apply_filters(offers: &[FlightOffer], filters: &FilterState) -> FilterOutcome {
    let mut kept: Vec<FlightOffer> = offers
        .iter()
        .filter(|offer| filters.stops.matches(offer.stop_count()))
        .filter(|offer| offer.price_total() <= filters.max_price)
        .filter(|offer| {
            filters.airlines.is_empty()
                || offer
                    .validating_airline_codes
                    .first()
                    .map(|code| filters.airlines.contains(code))
                    .unwrap_or(false)
        })
        .cloned()
        .collect();

    match filters.sort_by {
        SortOrder::Cheapest => {
            kept.sort_by(|a, b| a.price_total().total_cmp(&b.price_total()));
        }
        SortOrder::Fastest => kept.sort_by_key(|offer| offer.duration_minutes()),
    }

    let stats = compute_stats(&kept);
    FilterOutcome { offers: kept, stats }
}

fn compute_stats(offers: &[FlightOffer]) -> Option<FlightStats> {
    if offers.is_empty() {
        return None;
    }
    Some(FlightStats {
        cheapest_id: min_id(offers, |offer| offer.price_total()),
        fastest_id: min_id(offers, |offer| offer.duration_minutes() as f64),
        // Raw price and raw minutes summed at fixed weights. The units do not
        // line up and that is intentional: the ranking must match the
        // original heuristic, not a normalized score.
        best_value_id: min_id(offers, |offer| {
            0.7 * offer.price_total() + 0.3 * offer.duration_minutes() as f64
        }),
    })
}

/// Minimum by score; the first offer encountered wins ties.
fn min_id(offers: &[FlightOffer], score: impl Fn(&FlightOffer) -> f64) -> String {
    let mut best = &offers[0];
    let mut best_score = score(best);
    for offer in &offers[1..] {
        let s = score(offer);
        if s < best_score {
            best = offer;
            best_score = s;
        }
    }
    best.id.clone()
}
