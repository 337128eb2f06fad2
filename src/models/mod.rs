pub mod file;
pub mod session;
pub mod user;

pub use file::*;
pub use session::*;
pub use user::*;
