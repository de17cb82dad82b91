pub mod binary;
pub mod grammar;
pub mod model;
pub mod pointer;
pub mod processor;

pub use binary::{CapnpBinaryParser, CapnpBinarySerializer};
pub use model::CapnpSchema;
pub use processor::parse_schema;
