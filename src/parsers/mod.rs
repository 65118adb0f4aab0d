pub mod har;

pub use har::HarSource;
