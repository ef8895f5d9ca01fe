//! CLI command implementations
//!
//! Each command builds its collaborators from `Config` and prints a small
//! text report. Presentation beyond this operational tooling (bot menus,
//! web pages) lives outside this crate.

pub mod analyze;
pub mod init_db;
pub mod stats;

use std::sync::Arc;

use crate::{Config, MySqlStore, RedisCache, Result, StatsService};

/// Build the cached stats service plus a handle to the underlying store.
pub(crate) fn build_service(config: &Config) -> Result<(StatsService, Arc<MySqlStore>)> {
    let store = Arc::new(MySqlStore::connect(&config.database_url));
    let cache = Arc::new(RedisCache::with_ttl(
        &config.redis_url,
        config.cache_ttl_secs,
    )?);
    let service =
        StatsService::new(store.clone(), cache).with_top_limit(config.top_users_limit);
    Ok((service, store))
}
