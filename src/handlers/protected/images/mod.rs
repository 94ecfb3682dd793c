// handlers/protected/images - Upload, list, optimize and delete stored images
//
// Each write that derives one object from another records the hop in the
// lineage table so the chain can be walked back later.

pub mod delete;
pub mod list;
pub mod optimize;
pub mod upload;

pub use delete::delete;
pub use list::list;
pub use optimize::optimize;
pub use upload::upload;
