pub mod comparator;
pub mod directory;
pub mod fat_walker;
pub mod natural_order;
pub mod sort;
pub mod stream;
pub mod volume;

mod run;

pub use run::{sort_volume, SortReport};
