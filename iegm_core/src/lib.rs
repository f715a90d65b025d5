pub mod data_loader;
pub mod frame;
pub mod metadata;
pub mod models;
pub mod normalizer;

pub use data_loader::{DataLoader, ParsedTable};
pub use metadata::{canonical_file_name, infer_from_file_name, normalize_indicator, FrameGroup};
pub use models::{Detected, LoadedCsv, OrganizedFile, OrganizedFrame, Separator, TextEncoding};
pub use normalizer::{ColumnSelection, LabelSource, NormalizationStep};
