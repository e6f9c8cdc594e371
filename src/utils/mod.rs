pub mod encoding;
pub mod folding;

pub use encoding::*;
