pub mod models;
pub mod error;
pub mod finding;
pub mod finding_log;
pub mod analyzers;  // Analyzer trait + built-in analyzers
pub mod replay;
pub mod pipeline;
pub mod config;
pub mod parsers;
pub mod reporting;

// Re-export commonly used items
pub use models::*;
pub use error::*;
pub use finding::*;
pub use finding_log::*;
pub use analyzers::*;
pub use replay::*;
pub use pipeline::*;
pub use config::*;
pub use parsers::*;
pub use reporting::*;
