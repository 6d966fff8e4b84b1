//! Autopause engine
//!
//! A cycle runs three stages in order against one capacity:
//! probe its provisioning state, evaluate whether it has been idle, and
//! suspend it when it has. The loop drives cycles on a timer.

mod cycle;
mod evaluator;
mod executor;
mod r#loop;
mod prober;


pub use cycle::{Assessment, PauseCycle, PauseCycleBuilder};
pub use evaluator::IdlenessEvaluator;
pub use executor::PauseExecutor;
pub use prober::StateProber;
pub use r#loop::{CycleLoop, DEFAULT_CHECK_INTERVAL};
