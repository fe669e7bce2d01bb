pub mod digest;
pub mod kdf;
pub mod password;
pub mod schemes;

pub use digest::*;
pub use kdf::*;
pub use password::*;
pub use schemes::*;
