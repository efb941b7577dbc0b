use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Error;
use crate::models::FlightOffer;

/// Record name the saved offers live under. Kept stable for compatibility
/// with existing saved data.
const RECORD_NAME: &str = "bookmarkedFlights";

/// Persistent set of saved offers, keyed by offer id.
///
/// Storage is a single named record holding a JSON array of offers, in a
/// key/value table. Every mutation fires a broadcast signal so other open
/// views can reload; subscribers that lag merely coalesce reloads.
pub struct BookmarkStore {
    conn: Connection,
    changed: broadcast::Sender<()>,
}

impl BookmarkStore {
    pub fn open(path: &str) -> Result<Self, Error> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        let (changed, _) = broadcast::channel(16);
        Ok(Self { conn, changed })
    }

    /// Fires after every mutation of the saved set.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    pub fn list(&self) -> Result<Vec<FlightOffer>, Error> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE name = ?",
                [RECORD_NAME],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn has(&self, id: &str) -> Result<bool, Error> {
        Ok(self.list()?.iter().any(|offer| offer.id == id))
    }

    /// Saves an offer. Adding an already-present id leaves the set unchanged.
    pub fn add(&self, offer: &FlightOffer) -> Result<(), Error> {
        let mut offers = self.list()?;
        if offers.iter().any(|existing| existing.id == offer.id) {
            return Ok(());
        }
        offers.push(offer.clone());
        debug!(offer = %offer.id, "bookmarked offer");
        self.save(&offers)
    }

    /// Removes by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> Result<(), Error> {
        let mut offers = self.list()?;
        let before = offers.len();
        offers.retain(|offer| offer.id != id);
        if offers.len() == before {
            return Ok(());
        }
        debug!(offer = %id, "removed bookmark");
        self.save(&offers)
    }

    fn save(&self, offers: &[FlightOffer]) -> Result<(), Error> {
        let json = serde_json::to_string(offers)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO records (name, value) VALUES (?, ?)",
            params![RECORD_NAME, json],
        )?;
        // No receivers is fine; the signal only matters to open views.
        let _ = self.changed.send(());
        Ok(())
    }
}
