//! Cart and selection engine.
//!
//! Quantities are chosen in two steps: a product's quantity is first *staged*
//! (in memory only) and then *committed* into the cart, which is written to
//! durable storage after every change.
//!
//! - `engine`: `CartEngine` with stage / commit / remove / aggregate / hydrate
//! - `storage`: the single durable slot the cart is persisted to
//! - `command`: maps UI `(action, id)` pairs onto engine operations

pub mod command;
pub mod engine;
pub mod storage;

pub use command::{dispatch, Command, CommandError, CommandOutcome};
pub use engine::{CartEngine, CartLine, CartSummary};
pub use storage::{CartStorage, FileCartStorage, MemoryCartStorage, CART_SLOT};
