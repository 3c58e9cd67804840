//! Schema descriptors: columns, tables, indexes and database handles.

pub mod column;
pub mod handle;
pub mod index;
pub mod table;

pub use column::Column;
pub use handle::Handle;
pub use index::Index;
pub use table::{GRANT_GROUP, GRANT_PUBLIC, PRIV_SELECT, Table};
