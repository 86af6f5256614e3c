mod catalog;
mod extraction;
mod preprocessing;
mod preset;
mod runtime;

pub use catalog::*;
pub use extraction::*;
pub use preprocessing::*;
pub use preset::*;
pub use runtime::*;
