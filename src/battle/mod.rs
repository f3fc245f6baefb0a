pub mod actions;
pub mod ai;
pub mod combat;
pub mod conditions;
pub mod session;
pub mod snapshot;
pub mod turns;
pub mod types;
