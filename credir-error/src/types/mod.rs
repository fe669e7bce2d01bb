pub mod credential;
pub mod directory;

pub use credential::*;
pub use directory::*;
