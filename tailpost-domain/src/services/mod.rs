mod line_source;

pub use line_source::{BoxLineSequence, LineSource};
