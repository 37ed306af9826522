//! Moving packets between channels: the crossbar router and the tee.

mod crossbar;
mod tee;

pub use crossbar::{CrossbarContext, CrossbarError, FanPolicy};
pub use tee::{tee, TeeError};
