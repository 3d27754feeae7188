//! Allowance gating for mutating flows.
//!
//! Every swap, deposit and withdraw owns an [`ActionMachine`] that decides
//! whether an approval must be sent first, whether the primary action is
//! submittable, or whether nothing can be done yet.

mod machine;
mod state;

pub use machine::*;
pub use state::*;
