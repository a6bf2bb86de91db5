pub mod cookies;
pub mod email;
pub mod jwt;
pub mod money;
pub mod security;
pub mod time;

pub use jwt::*;
pub use security::*;
pub use time::*;
