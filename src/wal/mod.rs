//! Write-ahead log: record encoding, durable append transport, and startup replay.

pub mod parser;
pub mod record;
pub mod writer;

pub use parser::{parse_wal_dir, replay, ParsedWal};
pub use record::{WalHeader, WalOp};
pub use writer::{LocalFileTransport, WalTransport, WalWriter};
