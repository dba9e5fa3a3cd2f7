pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs_util;
pub mod kaggle;
pub mod output;
pub mod reconcile;
pub mod schema;
pub mod split;
pub mod store;
pub mod table;
