pub mod access_keys;
pub mod products;

pub use access_keys as access_code_entity;
pub use products as product_entity;
