//! Limit-pair and DCA tooling for the Coinbase Exchange (formerly Coinbase Pro) API.
//!
//! Every binary under `src/bin` (and `src/main.rs`) is a thin shell over the
//! modules here: one signed REST client, one config loader, one set of
//! plain-text record files.

pub mod account;
pub mod cli;
pub mod config;
pub mod dca;
pub mod display;
pub mod exchange;
pub mod feed;
pub mod journal;
pub mod ladder;
pub mod logging;
pub mod pricing;
pub mod profits;
pub mod reconcile;
