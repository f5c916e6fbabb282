//! Store - application store service for the web desktop
//!
//! Fetches package manifests from configured repositories, resolves
//! dependency graphs, stages and installs packages through the host, and
//! reconciles installed versions against the catalog to offer updates.

pub mod actors;
pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod host;
pub mod installer;
pub mod resolver;
pub mod settings;
pub mod updates;
