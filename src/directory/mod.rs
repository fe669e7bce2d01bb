pub mod model;
pub mod parser;
pub mod store;
pub mod watch;

pub use model::*;
pub use parser::{parse_snapshot, GROUP_ID_BASE, USER_ID_BASE};
pub use store::*;
pub use watch::*;
