//! Screen implementations

mod log_viewer;
mod resource_list;

pub use log_viewer::LogViewerScreen;
pub use resource_list::ResourceListScreen;
