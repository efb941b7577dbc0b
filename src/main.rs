use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{bail, Result};
use tracing::info;

use skylark::api::FlightApi;
use skylark::auth::{TokenManager, TokenSource};
use skylark::bookmarks::BookmarkStore;
use skylark::config::{Config, Credentials};
use skylark::gateway::Gateway;
use skylark::logging;
use skylark::models::{human_duration, FlightOffer, SearchKey};
use skylark::query::{self, FilterState, FlightStats, SortOrder, StopFilter};
use skylark::trends;

const BOOKMARKS_DB: &str = "skylark.db";

const USAGE: &str = "Usage: skylark ORIGIN DEST YYYY-MM-DD [ADULTS] [options]
       skylark --locations KEYWORD
       skylark --bookmarks

Options:
  --max-price N        Price ceiling (default from config.toml)
  --airlines AA,BA     Keep only these validating airlines
  --stops any|0|1|2+   Stop count bucket (default any)
  --sort cheapest|fastest
  --save OFFER_ID      Bookmark an offer from the result set
  --locations KEYWORD  Look up airport/city codes and exit
  --bookmarks          List saved offers and exit";

struct Cli {
    origin: String,
    destination: String,
    departure_date: String,
    adults: u32,
    max_price: Option<f64>,
    airlines: Vec<String>,
    stops: StopFilter,
    sort_by: SortOrder,
    save: Option<String>,
    locations: Option<String>,
    show_bookmarks: bool,
}

impl Cli {
    fn parse(args: &[String]) -> Result<Self> {
        let mut cli = Cli {
            origin: String::new(),
            destination: String::new(),
            departure_date: String::new(),
            adults: 1,
            max_price: None,
            airlines: Vec::new(),
            stops: StopFilter::Any,
            sort_by: SortOrder::Cheapest,
            save: None,
            locations: None,
            show_bookmarks: false,
        };

        let mut positional = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--bookmarks" => cli.show_bookmarks = true,
                "--max-price" => {
                    let value = iter.next().ok_or_else(|| usage_error("--max-price"))?;
                    cli.max_price = Some(value.parse()?);
                }
                "--airlines" => {
                    let value = iter.next().ok_or_else(|| usage_error("--airlines"))?;
                    cli.airlines = value
                        .split(',')
                        .map(|code| code.trim().to_uppercase())
                        .filter(|code| !code.is_empty())
                        .collect();
                }
                "--stops" => {
                    let value = iter.next().ok_or_else(|| usage_error("--stops"))?;
                    cli.stops = value.parse()?;
                }
                "--sort" => {
                    let value = iter.next().ok_or_else(|| usage_error("--sort"))?;
                    cli.sort_by = value.parse()?;
                }
                "--save" => {
                    let value = iter.next().ok_or_else(|| usage_error("--save"))?;
                    cli.save = Some(value.clone());
                }
                "--locations" => {
                    let value = iter.next().ok_or_else(|| usage_error("--locations"))?;
                    cli.locations = Some(value.clone());
                }
                other if other.starts_with("--") => bail!("unknown option {other}\n\n{USAGE}"),
                _ => positional.push(arg.clone()),
            }
        }

        if !cli.show_bookmarks && cli.locations.is_none() {
            if positional.len() < 3 {
                bail!("{USAGE}");
            }
            cli.origin = positional[0].clone();
            cli.destination = positional[1].clone();
            cli.departure_date = positional[2].clone();
            if let Some(adults) = positional.get(3) {
                cli.adults = adults.parse()?;
            }
        }
        Ok(cli)
    }

    fn filters(&self, default_max_price: f64) -> FilterState {
        FilterState {
            max_price: self.max_price.unwrap_or(default_max_price),
            airlines: self.airlines.clone(),
            stops: self.stops,
            sort_by: self.sort_by,
        }
    }
}

fn usage_error(flag: &str) -> color_eyre::eyre::Error {
    color_eyre::eyre::eyre!("{flag} needs a value\n\n{USAGE}")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::initialize_logging();
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = Cli::parse(&args)?;
    let config = Config::load();

    if cli.show_bookmarks {
        let store = BookmarkStore::open(BOOKMARKS_DB)?;
        let saved = store.list()?;
        if saved.is_empty() {
            println!("No saved offers.");
        }
        for offer in &saved {
            println!("{}", describe(offer, None));
        }
        return Ok(());
    }

    let credentials = Credentials::from_env()?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let tokens: Arc<dyn TokenSource> = Arc::new(TokenManager::new(
        http.clone(),
        &config.api.base_url,
        credentials,
    ));
    let gateway = Gateway::new(http, config.api.base_url.clone(), tokens);
    let api = FlightApi::new(
        gateway,
        Duration::from_secs(config.search.cache_ttl_seconds),
        config.search.max_results,
    );

    if let Some(keyword) = &cli.locations {
        let cities = api.search_locations(keyword).await?;
        if cities.is_empty() {
            println!("No matches for '{keyword}'.");
        }
        for city in &cities {
            println!(
                "{:<4} {}  ({}, {})",
                city.iata_code, city.name, city.address.city_name, city.address.country_name
            );
        }
        return Ok(());
    }

    let key = SearchKey::new(&cli.origin, &cli.destination, &cli.departure_date, cli.adults)?;
    let offers = api.search_offers(&key).await?;
    info!(count = offers.len(), "search complete");

    let outcome = query::apply_filters(&offers, &cli.filters(config.filters.default_max_price));
    if outcome.offers.is_empty() {
        println!("No offers matched.");
        return Ok(());
    }

    for offer in &outcome.offers {
        println!("{}", describe(offer, outcome.stats.as_ref()));
    }

    let trend = trends::price_trend(&outcome.offers);
    if trend.len() >= 2 {
        println!("\nLowest price by {}:", if trend[0].bucket_key.contains('T') { "hour" } else { "day" });
        for point in &trend {
            println!("  {:>6}  {:8.2}", point.label, point.price);
        }
    }

    if let Some(id) = &cli.save {
        match outcome.offers.iter().find(|offer| &offer.id == id) {
            Some(offer) => {
                BookmarkStore::open(BOOKMARKS_DB)?.add(offer)?;
                println!("\nSaved offer {id}.");
            }
            None => bail!("offer {id} is not in the current result set"),
        }
    }

    Ok(())
}

fn describe(offer: &FlightOffer, stats: Option<&FlightStats>) -> String {
    let (route, departs) = match offer.itineraries.first() {
        Some(itinerary) => {
            let from = itinerary
                .segments
                .first()
                .map(|s| s.departure.iata_code.as_str())
                .unwrap_or("???");
            let to = itinerary
                .segments
                .last()
                .map(|s| s.arrival.iata_code.as_str())
                .unwrap_or("???");
            let departs = itinerary
                .segments
                .first()
                .map(|s| s.departure.at.as_str())
                .unwrap_or("");
            (format!("{from}-{to}"), departs.to_string())
        }
        None => ("???".to_string(), String::new()),
    };

    let duration = offer
        .itineraries
        .first()
        .map(|itinerary| human_duration(&itinerary.duration))
        .unwrap_or_default();
    let airline = offer
        .validating_airline_codes
        .first()
        .map(String::as_str)
        .unwrap_or("--");
    let stops = offer.stop_count();

    let mut tags = String::new();
    if let Some(stats) = stats {
        if stats.cheapest_id == offer.id {
            tags.push_str(" [cheapest]");
        }
        if stats.fastest_id == offer.id {
            tags.push_str(" [fastest]");
        }
        if stats.best_value_id == offer.id {
            tags.push_str(" [best value]");
        }
    }

    format!(
        "{:<6} {}  {}  {:>8}  {} stop(s)  {}  {} {}{}",
        offer.id,
        route,
        departs,
        duration,
        stops,
        airline,
        offer.price.total,
        offer.price.currency,
        tags
    )
}
