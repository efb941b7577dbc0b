//! Minimum-price trend series for charting.
//!
//! Offers are bucketed by hour when every departure falls on one calendar
//! day, by day otherwise. Each bucket keeps only its cheapest offer. The
//! consuming layer treats a series with fewer than two points as not
//! chartable; that is its call, not an error here.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::models::FlightOffer;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTrendPoint {
    /// Truncated timestamp identifying the bucket, e.g. "2024-03-01T08" or
    /// "2024-03-01".
    pub bucket_key: String,
    /// Minimum price seen in the bucket.
    pub price: f64,
    /// Formatted departure time of the cheapest offer: "08:45" for hourly
    /// buckets, "Mar 1" for daily ones.
    pub label: String,
    pub sort_key: NaiveDateTime,
}

pub fn price_trend(offers: &[FlightOffer]) -> Vec<PriceTrendPoint> {
    let departures: Vec<(&FlightOffer, NaiveDateTime)> = offers
        .iter()
        .filter_map(|offer| match offer.first_departure() {
            Some(at) => Some((offer, at)),
            None => {
                debug!(offer = %offer.id, "skipping offer with unparseable departure");
                None
            }
        })
        .collect();
    if departures.is_empty() {
        return Vec::new();
    }

    let days: HashSet<_> = departures.iter().map(|(_, at)| at.date()).collect();
    let single_day = days.len() <= 1;

    let mut buckets: HashMap<String, PriceTrendPoint> = HashMap::new();
    for (offer, at) in departures {
        let bucket_key = if single_day {
            at.format("%Y-%m-%dT%H").to_string()
        } else {
            at.format("%Y-%m-%d").to_string()
        };
        let price = offer.price_total();
        let cheaper = buckets
            .get(&bucket_key)
            .map_or(true, |point| price < point.price);
        if cheaper {
            // The label and sort key come from the winning offer's own
            // departure time, not the bucket boundary.
            let label = if single_day {
                at.format("%H:%M").to_string()
            } else {
                at.format("%b %-d").to_string()
            };
            buckets.insert(
                bucket_key.clone(),
                PriceTrendPoint {
                    bucket_key,
                    price,
                    label,
                    sort_key: at,
                },
            );
        }
    }

    let mut points: Vec<PriceTrendPoint> = buckets.into_values().collect();
    points.sort_by_key(|point| point.sort_key);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_offer;

    #[test]
    fn test_same_hour_keeps_minimum_price() {
        let offers = vec![
            test_offer("A", "300.00", "PT2H", 1, "BA", "2024-01-01T08:00:00"),
            test_offer("B", "250.00", "PT2H", 1, "BA", "2024-01-01T08:45:00"),
        ];
        let points = price_trend(&offers);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 250.0);
        assert_eq!(points[0].bucket_key, "2024-01-01T08");
        // Label reflects the cheaper offer's departure, not the hour start.
        assert_eq!(points[0].label, "08:45");
    }

    #[test]
    fn test_single_day_buckets_by_hour() {
        let offers = vec![
            test_offer("A", "300.00", "PT2H", 1, "BA", "2024-01-01T08:10:00"),
            test_offer("B", "280.00", "PT2H", 1, "BA", "2024-01-01T11:30:00"),
            test_offer("C", "350.00", "PT2H", 1, "BA", "2024-01-01T11:55:00"),
        ];
        let points = price_trend(&offers);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "08:10");
        assert_eq!(points[1].price, 280.0);
    }

    #[test]
    fn test_multi_day_buckets_by_day_sorted_ascending() {
        let offers = vec![
            test_offer("B", "220.00", "PT2H", 1, "BA", "2024-01-02T09:00:00"),
            test_offer("A", "300.00", "PT2H", 1, "BA", "2024-01-01T08:00:00"),
        ];
        let points = price_trend(&offers);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].bucket_key, "2024-01-01");
        assert_eq!(points[0].label, "Jan 1");
        assert_eq!(points[1].bucket_key, "2024-01-02");
        assert_eq!(points[1].price, 220.0);
    }

    #[test]
    fn test_unparseable_departures_are_skipped() {
        let offers = vec![
            test_offer("A", "300.00", "PT2H", 1, "BA", "not-a-timestamp"),
            test_offer("B", "250.00", "PT2H", 1, "BA", "2024-01-01T08:45:00"),
        ];
        let points = price_trend(&offers);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 250.0);
    }

    #[test]
    fn test_empty_input_is_empty_series() {
        assert!(price_trend(&[]).is_empty());
    }
}
