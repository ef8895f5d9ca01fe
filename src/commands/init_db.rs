//! `init-db` command: create the MySQL schema.

use crate::{Config, MySqlStore, Result};

pub async fn run(config: &Config) -> Result<()> {
    let store = MySqlStore::connect(&config.database_url);
    store.init_schema().await?;
    println!("Schema ready");
    store.disconnect().await?;
    Ok(())
}
