pub mod access;
pub mod file;
pub mod session;
pub mod user;

pub use access::AccessGate;
pub use file::FileService;
pub use session::SessionService;
pub use user::UserService;
