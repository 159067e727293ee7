pub mod content;
pub mod error;
pub mod path;

pub use content::Content;
pub use error::{TreeError, TreeResult};
pub use path::{PathFragment, TreePath};
