pub mod code_generator;
pub mod file_name;
pub mod jwt;
pub mod password;

pub use code_generator::generate_access_code;
pub use file_name::*;
pub use jwt::*;
pub use password::*;
