pub mod ease;
pub mod transition;

pub use ease::Ease;
pub use transition::{Timing, TransitionSet, TransitionSettings};
