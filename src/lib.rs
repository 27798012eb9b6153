pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;

pub use db::DbPool;

use config::Config;

#[cfg(test)]
mod tests;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        Self { config, db }
    }
}
