use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Error;
use crate::gateway::Gateway;
use crate::models::{City, FlightOffer, SearchKey};

pub const OFFERS_ENDPOINT: &str = "/v2/shopping/flight-offers";
pub const LOCATIONS_ENDPOINT: &str = "/v1/reference-data/locations";

#[derive(Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
}

#[derive(Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    data: Vec<City>,
}

struct CachedSearch {
    fetched_at: Instant,
    offers: Vec<FlightOffer>,
}

/// Fetches raw offers and city matches through the authenticated gateway.
///
/// Search results are cached per [`SearchKey`] for the configured freshness
/// window; within the window an identical search returns the cached offers
/// without a network call, after it a new fetch replaces the entry.
pub struct FlightApi {
    gateway: Gateway,
    cache: Mutex<HashMap<SearchKey, CachedSearch>>,
    cache_ttl: Duration,
    max_results: u32,
}

impl FlightApi {
    pub fn new(gateway: Gateway, cache_ttl: Duration, max_results: u32) -> Self {
        Self {
            gateway,
            cache: Mutex::new(HashMap::new()),
            cache_ttl,
            max_results,
        }
    }

    pub async fn search_offers(&self, key: &SearchKey) -> Result<Vec<FlightOffer>, Error> {
        if !key.is_complete() {
            debug!("search key incomplete, skipping dispatch");
            return Ok(Vec::new());
        }

        if let Some(offers) = self.cached(key) {
            debug!(origin = %key.origin, destination = %key.destination, "serving offers from cache");
            return Ok(offers);
        }

        let query = [
            ("originLocationCode", key.origin.clone()),
            ("destinationLocationCode", key.destination.clone()),
            ("departureDate", key.departure_date.format("%Y-%m-%d").to_string()),
            ("adults", key.adults.to_string()),
            ("max", self.max_results.to_string()),
        ];
        let response: OffersResponse = self.gateway.get_json(OFFERS_ENDPOINT, &query).await?;
        info!(
            count = response.data.len(),
            origin = %key.origin,
            destination = %key.destination,
            "fetched flight offers"
        );

        self.cache.lock().unwrap().insert(
            key.clone(),
            CachedSearch {
                fetched_at: Instant::now(),
                offers: response.data.clone(),
            },
        );
        Ok(response.data)
    }

    pub async fn search_locations(&self, keyword: &str) -> Result<Vec<City>, Error> {
        let query = [
            ("subType", "CITY,AIRPORT".to_string()),
            ("keyword", keyword.to_string()),
            ("page[limit]", "10".to_string()),
        ];
        let response: LocationsResponse =
            self.gateway.get_json(LOCATIONS_ENDPOINT, &query).await?;
        Ok(response.data)
    }

    fn cached(&self, key: &SearchKey) -> Option<Vec<FlightOffer>> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.offers.clone())
    }

    #[cfg(test)]
    fn seed_cache(&self, key: SearchKey, offers: Vec<FlightOffer>) {
        self.cache.lock().unwrap().insert(
            key,
            CachedSearch {
                fetched_at: Instant::now(),
                offers,
            },
        );
    }
}
