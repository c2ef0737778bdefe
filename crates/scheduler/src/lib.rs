pub mod ticker;

pub use ticker::{Tick, TickService};
