pub mod access_code;
pub mod admin;
pub mod common;
pub mod draw;
pub mod product;

pub use access_code::*;
pub use admin::*;
pub use common::*;
pub use draw::*;
pub use product::*;
