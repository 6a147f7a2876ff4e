pub mod mask;
pub mod extraction;
pub mod merge;
pub mod filter;

pub use mask::*;
pub use extraction::*;
pub use merge::*;
pub use filter::*;
