//! Database configuration.

use kvtable_engine::Durability;
use std::time::Duration;

/// How logical tables map onto physical containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One container per table, named after the table.
    ///
    /// Creating or destroying a table bumps the schema version.
    Dedicated,
    /// A fixed pool of containers shared by every table.
    ///
    /// Tables are hash-assigned to a container and kept apart by composite
    /// keys, so tables come and go without schema changes.
    Pooled {
        /// Number of containers in the pool.
        store_count: u32,
    },
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Pooled {
            store_count: DEFAULT_STORE_COUNT,
        }
    }
}

/// Default pool size of [`Layout::Pooled`].
pub const DEFAULT_STORE_COUNT: u32 = 64;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Table-to-container mapping.
    pub layout: Layout,

    /// Fixed delay before each reopen attempt after the engine drops the
    /// connection.
    pub reopen_delay: Duration,

    /// Durability hint for every transaction.
    pub durability: Durability,

    /// How long a table operation waits for a live connection while a
    /// reopen is in progress (`None` = until reopened or closed).
    pub open_wait: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            reopen_delay: Duration::from_millis(200),
            durability: Durability::Relaxed,
            open_wait: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table layout.
    #[must_use]
    pub const fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Uses one container per table.
    #[must_use]
    pub const fn dedicated(self) -> Self {
        self.layout(Layout::Dedicated)
    }

    /// Uses a shared pool of `store_count` containers.
    #[must_use]
    pub const fn pooled(self, store_count: u32) -> Self {
        self.layout(Layout::Pooled { store_count })
    }

    /// Sets the reopen delay.
    #[must_use]
    pub const fn reopen_delay(mut self, delay: Duration) -> Self {
        self.reopen_delay = delay;
        self
    }

    /// Sets the transaction durability hint.
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Bounds how long operations wait for a reopen.
    #[must_use]
    pub const fn open_wait(mut self, wait: Duration) -> Self {
        self.open_wait = Some(wait);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.layout, Layout::Pooled { store_count: 64 });
        assert_eq!(config.reopen_delay, Duration::from_millis(200));
        assert_eq!(config.durability, Durability::Relaxed);
        assert!(config.open_wait.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .dedicated()
            .reopen_delay(Duration::from_millis(50))
            .durability(Durability::Strict)
            .open_wait(Duration::from_secs(1));

        assert_eq!(config.layout, Layout::Dedicated);
        assert_eq!(config.reopen_delay, Duration::from_millis(50));
        assert_eq!(config.durability, Durability::Strict);
        assert_eq!(config.open_wait, Some(Duration::from_secs(1)));
        assert_eq!(
            Config::new().pooled(4).layout,
            Layout::Pooled { store_count: 4 }
        );
    }
}
