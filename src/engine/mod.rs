//! Execution engine for flyform
//!
//! The engine orchestrates:
//! 1. Refreshing - Fold remote reality into tracked state
//! 2. Planning - Compare declarations against tracked state
//! 3. Executing - Apply changes in order, recording partial progress

pub mod differ;
pub mod executor;
pub mod planner;
pub mod refresh;

pub use differ::display_plan;
pub use executor::{ExecuteOptions, execute};
pub use planner::Plan;
pub use refresh::{RefreshReport, refresh_all};
