//! A lightweight, single-node, OpenStack Swift-compatible object storage
//! server: a Keystone v3 auth stub plus the Swift v1 container/object API
//! over an embedded metadata store and a filesystem blob backend.

pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod metadata;
pub mod model;
pub mod path;
pub mod scheduler;
pub mod service;
pub mod web;
