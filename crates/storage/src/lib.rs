pub mod seen;

pub use seen::SeenStore;
