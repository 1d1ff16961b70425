//! Rango - a link directory of categories and pages
//!
//! Visitors browse categories and the pages filed under them. Signed-in
//! users add categories and pages, like categories and keep a profile. A
//! REST API exposes the catalogue.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
