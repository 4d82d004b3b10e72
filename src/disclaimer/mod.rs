//! One-time medical disclaimer.
//!
//! The disclaimer is shown on first run and whenever the user asks for it.
//! Whether it has been acknowledged is a single flag kept in a
//! [`KeyValueStore`], read once at startup and written once on
//! acknowledgement. It is independent of the analysis flow.

pub mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

use anyhow::Result;
use tracing::{debug, info};

/// Key under which the acknowledgement is stored.
pub const DISCLAIMER_KEY: &str = "jrscan_disclaimer_seen";

/// Gate deciding whether the disclaimer must be displayed.
pub struct DisclaimerGate<S: KeyValueStore> {
    store: S,
    seen: bool,
    open: bool,
}

impl<S: KeyValueStore> DisclaimerGate<S> {
    /// Read the persisted flag once.
    pub fn load(store: S) -> Result<Self> {
        let seen = store.get(DISCLAIMER_KEY)?.as_deref() == Some("true");
        debug!("Disclaimer previously acknowledged: {}", seen);

        Ok(Self {
            store,
            seen,
            open: !seen,
        })
    }

    /// Whether the disclaimer is currently displayed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the user has ever acknowledged it.
    pub fn has_seen(&self) -> bool {
        self.seen
    }

    /// Show the disclaimer again on request.
    pub fn reopen(&mut self) {
        self.open = true;
    }

    /// Close the disclaimer and persist the acknowledgement.
    pub fn acknowledge(&mut self) -> Result<()> {
        self.open = false;
        if !self.seen {
            self.store.set(DISCLAIMER_KEY, "true")?;
            self.seen = true;
            info!("Disclaimer acknowledged");
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}
