pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod normalize;
pub mod output;
pub mod store;
pub mod worker;
