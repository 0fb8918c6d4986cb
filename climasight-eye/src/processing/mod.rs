//! Image preprocessing and box post-processing

pub mod letterbox;
pub mod nms;

pub use letterbox::Letterbox;
pub use nms::non_max_suppression;
