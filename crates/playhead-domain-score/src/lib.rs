pub mod model;
pub mod timeline;

pub use model::*;
pub use timeline::*;
