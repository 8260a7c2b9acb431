mod batch;
mod key_material;
mod log_line;
mod source_kind;

pub use batch::Batch;
pub use key_material::KeyMaterial;
pub use log_line::LogLine;
pub use source_kind::SourceKind;
