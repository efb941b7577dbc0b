use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One priced flight option as returned by the offers endpoint.
///
/// Offers are immutable values; everything derived from them (filter results,
/// stats, trend points) is recomputed rather than patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    pub id: String,
    pub price: Price,
    pub itineraries: Vec<Itinerary>,
    pub validating_airline_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Decimal amount as a string, e.g. "412.30". Kept as received.
    pub total: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    /// ISO-8601-style duration, e.g. "PT12H30M".
    pub duration: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub departure: Endpoint,
    pub arrival: Endpoint,
    pub carrier_code: String,
    pub number: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub iata_code: String,
    /// Local timestamp like "2024-01-01T08:45:00".
    pub at: String,
}

/// Airport or city match from the location search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: String,
    pub name: String,
    pub iata_code: String,
    pub address: CityAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityAddress {
    pub city_name: String,
    pub country_name: String,
}

/// Identifies one query result set; used as the search cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub adults: u32,
}

impl SearchKey {
    pub fn new(
        origin: &str,
        destination: &str,
        departure_date: &str,
        adults: u32,
    ) -> Result<Self, Error> {
        let departure_date = NaiveDate::parse_from_str(departure_date, "%Y-%m-%d")
            .map_err(|_| Error::InvalidSearch(format!("bad departure date: {departure_date}")))?;
        Ok(Self {
            origin: origin.trim().to_uppercase(),
            destination: destination.trim().to_uppercase(),
            departure_date,
            adults,
        })
    }

    /// A search is only dispatched when both endpoints are filled in.
    pub fn is_complete(&self) -> bool {
        !self.origin.is_empty() && !self.destination.is_empty()
    }
}

impl FlightOffer {
    /// Numeric price; an unparseable total sorts and filters as 0.
    pub fn price_total(&self) -> f64 {
        self.price.total.parse().unwrap_or(0.0)
    }

    /// Stops on the first itinerary: segment count minus one.
    pub fn stop_count(&self) -> usize {
        self.itineraries
            .first()
            .map(|itinerary| itinerary.segments.len().saturating_sub(1))
            .unwrap_or(0)
    }

    /// Total minutes of the first itinerary's duration.
    pub fn duration_minutes(&self) -> u32 {
        self.itineraries
            .first()
            .map(|itinerary| duration_minutes(&itinerary.duration))
            .unwrap_or(0)
    }

    /// Departure time of the first segment, if it parses.
    pub fn first_departure(&self) -> Option<NaiveDateTime> {
        let at = &self.itineraries.first()?.segments.first()?.departure.at;
        parse_departure(at)
    }
}

/// Parses durations of the restricted form `PT(nH)?(nM)?` into minutes.
///
/// Absent components count as zero and anything outside the pattern collapses
/// to 0 minutes rather than an error, so a malformed duration sorts as the
/// fastest flight instead of breaking the pipeline. Trailing text after a
/// matched component (e.g. a seconds field) is ignored.
pub fn duration_minutes(raw: &str) -> u32 {
    let Some(rest) = raw.strip_prefix("PT") else {
        return 0;
    };
    let (hours, rest) = match lead_unit(rest, b'H') {
        Some((hours, rest)) => (hours, rest),
        None => (0, rest),
    };
    let minutes = lead_unit(rest, b'M').map(|(minutes, _)| minutes).unwrap_or(0);
    hours * 60 + minutes
}

/// Leading digits followed by `unit`, or None if the input starts otherwise.
fn lead_unit(s: &str, unit: u8) -> Option<(u32, &str)> {
    let digits = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || s.as_bytes().get(digits) != Some(&unit) {
        return None;
    }
    let value = s[..digits].parse().ok()?;
    Some((value, &s[digits + 1..]))
}

/// "PT12H30M" -> "12h 30m" for display.
pub fn human_duration(raw: &str) -> String {
    raw.replace("PT", "").replace('H', "h ").replace('M', "m")
}

pub(crate) fn parse_departure(at: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Offer fixture shared by the unit tests in this crate.
#[cfg(test)]
pub(crate) fn test_offer(
    id: &str,
    total: &str,
    duration: &str,
    segment_count: usize,
    airline: &str,
    departs_at: &str,
) -> FlightOffer {
    let segments = (0..segment_count.max(1))
        .map(|i| Segment {
            id: format!("{id}-s{i}"),
            departure: Endpoint {
                iata_code: "JFK".into(),
                at: departs_at.into(),
            },
            arrival: Endpoint {
                iata_code: "LHR".into(),
                at: departs_at.into(),
            },
            carrier_code: airline.into(),
            number: format!("{}{}", airline, 100 + i),
            duration: duration.into(),
        })
        .collect();
    FlightOffer {
        id: id.into(),
        price: Price {
            total: total.into(),
            currency: "USD".into(),
        },
        itineraries: vec![Itinerary {
            duration: duration.into(),
            segments,
        }],
        validating_airline_codes: vec![airline.into()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_parsing() {
        assert_eq!(duration_minutes("PT2H30M"), 150);
        assert_eq!(duration_minutes("PT45M"), 45);
        assert_eq!(duration_minutes("PT3H"), 180);
        assert_eq!(duration_minutes("PT0H5M"), 5);
    }

    #[test]
    fn test_duration_zero_fallback() {
        assert_eq!(duration_minutes(""), 0);
        assert_eq!(duration_minutes("12H30M"), 0);
        assert_eq!(duration_minutes("PT"), 0);
        assert_eq!(duration_minutes("PTxx"), 0);
        // Trailing seconds are ignored, not an error.
        assert_eq!(duration_minutes("PT1H30M45S"), 90);
        // A number with a bad unit contributes nothing.
        assert_eq!(duration_minutes("PT2H5X"), 120);
    }

    #[test]
    fn test_offer_deserializes_from_wire_json() {
        let json = r#"
            {
                "id": "1",
                "price": { "total": "412.30", "currency": "USD" },
                "itineraries": [
                    {
                        "duration": "PT7H55M",
                        "segments": [
                            {
                                "id": "10",
                                "departure": { "iataCode": "JFK", "at": "2024-03-01T18:05:00" },
                                "arrival": { "iataCode": "LHR", "at": "2024-03-02T06:00:00" },
                                "carrierCode": "BA",
                                "number": "178",
                                "duration": "PT7H55M"
                            }
                        ]
                    }
                ],
                "validatingAirlineCodes": ["BA"]
            }
        "#;
        let offer: FlightOffer = serde_json::from_str(json).expect("offer should deserialize");
        assert_eq!(offer.id, "1");
        assert_eq!(offer.price_total(), 412.30);
        assert_eq!(offer.stop_count(), 0);
        assert_eq!(offer.duration_minutes(), 475);
        assert_eq!(offer.validating_airline_codes[0], "BA");
        let departure = offer.first_departure().expect("departure should parse");
        assert_eq!(departure.to_string(), "2024-03-01 18:05:00");
    }

    #[test]
    fn test_search_key_normalizes_codes() {
        let key = SearchKey::new(" jfk ", "lhr", "2024-03-01", 1).unwrap();
        assert_eq!(key.origin, "JFK");
        assert_eq!(key.destination, "LHR");
        assert!(key.is_complete());
    }

    #[test]
    fn test_search_key_rejects_bad_date() {
        assert!(matches!(
            SearchKey::new("JFK", "LHR", "03/01/2024", 1),
            Err(Error::InvalidSearch(_))
        ));
    }

    #[test]
    fn test_incomplete_key() {
        let key = SearchKey::new("", "LHR", "2024-03-01", 1).unwrap();
        assert!(!key.is_complete());
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration("PT12H30M"), "12h 30m");
        assert_eq!(human_duration("PT45M"), "45m");
    }
}
