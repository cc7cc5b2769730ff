pub mod app;
pub mod catalog;
pub mod config;
pub mod dataset_filter;
pub mod domain;
pub mod download;
pub mod error;
pub mod mgrs;
pub mod output;
pub mod pipeline;
pub mod predicate;
pub mod schema;
pub mod species;
pub mod table;
