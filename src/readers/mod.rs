pub mod diag;
pub mod meshdir;
pub mod types;
pub mod velocity;

pub use diag::{find_diag_file, load_area_weight};
pub use meshdir::load_mesh;
pub use types::{AreaWeight, ReadError, normalize_dim_name};
pub use velocity::{find_w_files, load_w};
