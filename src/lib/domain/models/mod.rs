pub mod column_type;
pub mod table;
pub mod table_ref;
pub mod write_mode;

pub use column_type::SqlType;
pub use table::{Cell, ColumnSelection, Table};
pub use table_ref::TableRef;
pub use write_mode::WriteMode;
