mod document;
mod embedding;
mod record;
mod search_result;
mod sync_run;

pub use document::*;
pub use embedding::*;
pub use record::*;
pub use search_result::*;
pub use sync_run::*;
