pub mod material_loader;
pub mod toml_loader;

pub use material_loader::{extract_text, load_material};
pub use toml_loader::{load_all_exam_files, load_exam_file, load_generation_job};
