pub mod enums;
pub mod lab_request;
pub mod user;

pub use enums::*;
pub use lab_request::*;
pub use user::*;
