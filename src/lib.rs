pub mod align;
pub mod cli;
pub mod demux;
pub mod error;
pub mod index;
pub mod output;
pub mod pipeline;
