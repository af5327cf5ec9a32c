//! Core module containing the filter state types, codec and signer

pub mod codec;
pub mod error;
pub mod events;
pub mod persistence;
pub mod response;
pub mod signer;
pub mod state;
pub mod value;

pub use error::{ConfigError, FilterError, SignatureError, StorageError};
pub use events::{ChangeBus, ChangeEnvelope, FilterChange};
pub use persistence::StateStorage;
pub use response::{ResponseMeta, ResponseParser};
pub use signer::{Sha256Signer, Signature, Signer};
pub use state::{FilterPatch, FilterState, SortOrder, SortSpec};
pub use value::{FilterMap, FilterValue};
