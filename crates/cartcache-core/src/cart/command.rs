//! UI commands.
//!
//! Front ends describe user actions as an action tag plus a product id
//! (`inc`, `dec`, `addToCart`, `removeFromCart`). `dispatch` routes them to
//! the engine.

use thiserror::Error;

use super::{CartEngine, CartStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Increment(String),
    Decrement(String),
    AddToCart(String),
    RemoveFromCart(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown action: '{0}'. Valid actions: inc, dec, addToCart, removeFromCart")]
    UnknownAction(String),
}

impl Command {
    pub fn parse(action: &str, product_id: &str) -> Result<Self, CommandError> {
        let id = product_id.to_string();
        match action {
            "inc" => Ok(Command::Increment(id)),
            "dec" => Ok(Command::Decrement(id)),
            "addToCart" => Ok(Command::AddToCart(id)),
            "removeFromCart" => Ok(Command::RemoveFromCart(id)),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }

    pub fn product_id(&self) -> &str {
        match self {
            Command::Increment(id)
            | Command::Decrement(id)
            | Command::AddToCart(id)
            | Command::RemoveFromCart(id) => id,
        }
    }
}

/// What a command did, so the caller knows what to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The staged quantity for the product is now this value.
    Staged(u32),
    /// The cart changed; the badge should now show this total.
    CartChanged { total_quantity: u64 },
    Unchanged,
}

pub fn dispatch<S: CartStorage>(engine: &mut CartEngine<S>, command: &Command) -> CommandOutcome {
    match command {
        Command::Increment(id) => CommandOutcome::Staged(engine.stage(id, 1)),
        Command::Decrement(id) => CommandOutcome::Staged(engine.stage(id, -1)),
        Command::AddToCart(id) => match engine.commit(id) {
            Some(total_quantity) => CommandOutcome::CartChanged { total_quantity },
            None => CommandOutcome::Unchanged,
        },
        Command::RemoveFromCart(id) => CommandOutcome::CartChanged {
            total_quantity: engine.remove(id),
        },
    }
}
