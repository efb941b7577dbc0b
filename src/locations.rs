//! Debounced airport/city search.
//!
//! [`CitySearcher::spawn`] starts a background task that owns the debounce:
//! submitted keywords are collapsed until input has been quiet for the full
//! period, then exactly one lookup is dispatched for the newest keyword.
//! Each emitted [`CityUpdate`] carries a monotonically increasing generation
//! so a consumer holding results from an earlier dispatch can recognize and
//! drop them instead of letting a stale response overwrite a newer one.
//!
//! A failed lookup degrades to an empty result set rather than propagating;
//! this is the one place a network error is deliberately swallowed, since a
//! typeahead with no suggestions is strictly better than a typeahead that
//! crashes the form.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Error;
use crate::models::City;

/// Keywords shorter than this never hit the network.
pub const MIN_KEYWORD_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct CityUpdate {
    /// Increases by one per dispatched lookup; keep the highest seen.
    pub generation: u64,
    pub keyword: String,
    pub cities: Vec<City>,
}

/// Handle for submitting keystrokes to the debounce task.
pub struct CitySearcher {
    input: mpsc::UnboundedSender<String>,
}

impl CitySearcher {
    /// Spawns the debounce task.
    ///
    /// `lookup` performs the actual remote search (see
    /// [`FlightApi::search_locations`](crate::api::FlightApi::search_locations));
    /// it is injected so the task has no opinion about transport. Returns the
    /// submit handle and the receiver for result updates. The task exits when
    /// either end is dropped.
    pub fn spawn<F, Fut>(
        lookup: F,
        quiet_period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<CityUpdate>)
    where
        F: Fn(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<City>, Error>> + Send,
    {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut generation: u64 = 0;
            while let Some(mut keyword) = input_rx.recv().await {
                // Keep absorbing keystrokes until none arrive for the full
                // quiet period; only the newest survives.
                loop {
                    tokio::select! {
                        newer = input_rx.recv() => match newer {
                            Some(k) => keyword = k,
                            None => break,
                        },
                        _ = tokio::time::sleep(quiet_period) => break,
                    }
                }

                generation += 1;
                let cities = if keyword.chars().count() < MIN_KEYWORD_LEN {
                    Vec::new()
                } else {
                    match lookup(keyword.clone()).await {
                        Ok(cities) => cities,
                        Err(error) => {
                            warn!(%error, %keyword, "city lookup failed, returning no matches");
                            Vec::new()
                        }
                    }
                };

                debug!(generation, %keyword, count = cities.len(), "city search update");
                if update_tx
                    .send(CityUpdate {
                        generation,
                        keyword,
                        cities,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        (Self { input: input_tx }, update_rx)
    }

    /// Feeds one keystroke's worth of input into the debouncer.
    pub fn submit(&self, keyword: impl Into<String>) {
        let _ = self.input.send(keyword.into());
    }
}
