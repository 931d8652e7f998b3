mod ageing;
mod error;
mod line_item;
mod money;
mod status;
mod tax;
mod transaction;

pub use ageing::*;
pub use error::*;
pub use line_item::*;
pub use money::*;
pub use status::*;
pub use tax::*;
pub use transaction::*;
