//! Core library for cartcache.
//!
//! - `proxy`: the offline cache proxy that sits under every network read
//! - `cart`: staged quantities, the durable cart, and the command dispatcher
//! - `catalog`: catalog models and the loader that fetches through the proxy
//! - `connectivity`: online/offline state with change notifications
//! - `config`: application configuration and directory layout

pub mod cart;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod proxy;
pub mod utils;
