//! The 5250 command/order protocol: byte constants, the TN5250E record
//! header, the inbound order dispatcher, and the outbound response builder.

pub mod codes;
pub mod dispatcher;
pub mod header;
pub mod outbound;

pub use codes::{AidKey, Command, Order};
pub use dispatcher::Dispatcher;
pub use header::{Opcode, RecordHeader};
pub use outbound::{CollectionMode, OutboundBuilder};
