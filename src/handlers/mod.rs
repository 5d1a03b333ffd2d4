pub mod admin;
pub mod draw;
pub mod uploads;

pub use admin::admin_config;
pub use draw::draw_config;
pub use uploads::uploads_config;
