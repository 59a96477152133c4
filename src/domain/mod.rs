pub mod labels;
pub mod snapshot;

pub use labels::*;
pub use snapshot::*;
