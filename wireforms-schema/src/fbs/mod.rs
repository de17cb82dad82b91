pub mod binary;
pub mod grammar;
pub mod model;
pub mod processor;

pub use binary::{FbsBinaryParser, FbsBinarySerializer};
pub use model::FbsSchema;
pub use processor::parse_schema;
