pub mod account;
pub mod api;
pub mod bot;
pub mod bot_config;
pub mod db;
pub mod decision;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod llm;
pub mod scheduler;
pub mod schema;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod testing;
