pub mod iterator;
pub mod timevalue;

pub use iterator::{Arithmetic, Drunk, Geometric, Item, ListChoose, ListSequence, ListShuffle, Pattern};
pub use timevalue::timevalue;
