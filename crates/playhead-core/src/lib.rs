pub mod app;
pub mod audio_params;
pub mod click_graph;
pub mod config;
pub mod input_aggregator;
pub mod ipc;
pub mod metronome;
pub mod scroll_clock;
pub mod store_writer;

pub use app::*;
pub use audio_params::*;
pub use click_graph::*;
pub use config::*;
pub use input_aggregator::*;
pub use ipc::*;
pub use metronome::*;
pub use scroll_clock::*;
pub use store_writer::*;
