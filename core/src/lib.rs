pub mod collator;
pub mod critical_section;
pub mod device;
pub mod error;
pub mod options;
pub mod rng;
pub mod selection;

pub use collator::{AsciiCollator, Collator};
pub use critical_section::critical_section;
pub use device::{BlockDevice, FileDevice, MemoryDevice, SectorCache};
pub use error::{EngineError, Result};
pub use options::{GroupOrder, OrderFunction, SortOptions};
pub use selection::{PathLists, RegexLists, Selection};
