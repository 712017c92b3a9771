//! Wire-level value types shared by the LOB and cursor engines

mod lob;
mod rowid;

pub use lob::{LobData, LobLocator, LobValue};
pub use rowid::{RowId, MAX_ROWID_LENGTH};
