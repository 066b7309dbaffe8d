pub mod otp;
pub mod user;

pub use otp::*;
pub use user::*;
