//! ASCII protocol: parsing, wire codec, replies, and the dispatcher that
//! turns a parsed [`Command`] into a [`Response`] by driving a
//! [`crate::storage::Cache`].

mod codec;
mod command;
mod dispatch;
mod error;
mod response;

pub use codec::AsciiCodec;
pub use command::{Command, PendingStorage, StorageCommand, StorageVerb};
pub use dispatch::{dispatch, Outcome};
pub use error::ProtocolError;
pub use response::{Response, ValueLine};
