pub mod result;
pub mod row;
pub mod settings;

pub use result::{SyncResult, SyncStatus, UpdateEntry};
pub use row::{AddressedRow, FilteredRows, RowRecord, SheetRows};
pub use settings::{FieldMapping, SyncSettings};
