mod payout_world;
mod steps;

pub use payout_world::{PayoutSystem, PayoutWorld};
