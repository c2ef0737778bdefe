pub mod onboard;
pub mod run;
pub mod seen;
pub mod status;
