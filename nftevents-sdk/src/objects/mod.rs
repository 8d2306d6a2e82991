pub mod blockchains;
pub mod event;
pub mod push;

pub use blockchains::Blockchain;
pub use event::{CanonicalEvent, EventType, TokenId, TokenMetadataUpdate, TokenTransfer};
pub use push::{EventInput, PushResponse};
