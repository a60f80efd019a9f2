mod event_set;
pub(crate) use event_set::*;

mod primitives;
pub use primitives::*;
