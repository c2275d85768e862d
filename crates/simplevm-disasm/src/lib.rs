pub mod analyze;
pub mod model;

pub use analyze::{analyze_entries, build_report, Analysis, Edge, EdgeKind, LabelKV, Report};
pub use model::{load_image, Image};
