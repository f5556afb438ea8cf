pub mod audio;
pub mod layout;
pub mod midi;
pub mod storage;
pub mod types;

pub use audio::*;
pub use layout::*;
pub use midi::*;
pub use storage::*;
pub use types::*;
