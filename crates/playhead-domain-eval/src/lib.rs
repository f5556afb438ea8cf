pub mod matcher;
pub mod miss_scanner;
pub mod recorder;

pub use matcher::*;
pub use miss_scanner::*;
pub use recorder::*;
