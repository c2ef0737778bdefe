pub mod coordinator;
pub mod cutoff;
pub mod discovery;
pub mod locator;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, TickReport};
pub use cutoff::{CutoffDecision, CutoffFilter, SkipReason};
pub use discovery::{ListingSource, SearchPageDiscovery};
pub use locator::LocatorChain;
pub use workflow::{
    ContactFormState, ContactWorkflow, HandledReason, ListingProcessor, Outcome, Stage,
};
