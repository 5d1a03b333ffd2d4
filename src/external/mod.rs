pub mod image_saver;
pub mod supabase;

pub use image_saver::*;
pub use supabase::*;
