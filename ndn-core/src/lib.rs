pub mod name;
pub mod packets;
pub mod tlv;

pub use name::Name;
pub use packets::{Data, Interest, MetaInfo, Nack, NackReason, PacketTags};
pub use tlv::{TlvElement, TlvError};
