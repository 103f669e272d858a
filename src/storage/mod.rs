//! Columnar property storage, primary-key indexers, and CSR adjacency — the layers a
//! `MutableGraph` composes per label and per triplet.

pub mod column;
pub mod csr;
pub mod dual_csr;
pub mod indexer;
pub mod table;

pub use column::{Column, FixedColumn, StringColumn};
pub use csr::{Csr, CsrLike, EdgeView};
pub use dual_csr::{DualCsr, EdgePayload};
pub use indexer::{IdIndexer, LfIndexer};
pub use table::{ColumnDef, RowView, Table};
