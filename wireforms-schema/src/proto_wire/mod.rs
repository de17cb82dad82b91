pub mod codec;
pub mod varint;

pub use codec::ProtoBinaryCodec;
