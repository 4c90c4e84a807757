pub mod diversity;
pub mod filter;

pub use diversity::{SourceKey, adjust};
pub use filter::{FilterParams, OutlierMethod, filter, gap_cutoff, outlier_cutoff};
