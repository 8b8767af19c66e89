//! Values and tuples, the atomic units flowing through the engine.

mod tuple;
mod value;

pub use tuple::{compare_slots, slots_equal, Slot, Tuple};
pub use value::Value;
