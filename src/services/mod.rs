pub mod admin_auth_service;
pub mod catalog_service;
pub mod draw_service;
pub mod session_service;

pub use admin_auth_service::*;
pub use catalog_service::*;
pub use draw_service::*;
pub use session_service::*;

use crate::external::DownloadDirSaver;
use crate::store::CatalogBackend;

pub type Catalog = CatalogService<CatalogBackend>;
pub type VisitorSession = DrawSession<CatalogBackend, DownloadDirSaver>;
pub type VisitorSessions = SessionRegistry<CatalogBackend, DownloadDirSaver>;
