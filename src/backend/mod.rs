pub mod handler;
pub mod options;
pub mod result_code;

pub use handler::*;
pub use options::BackendOptions;
pub use result_code::ResultCode;
