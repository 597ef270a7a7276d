pub mod entry;
pub mod exfat;
pub mod fat1x;
pub mod long_name;

pub use exfat::ExFatRecord;
pub use fat1x::Fat1xRecord;
