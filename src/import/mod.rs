pub mod error;
pub mod files;
pub mod importer;
pub mod normalize;
pub mod parse;
pub mod reconcile;
pub mod record;
pub mod tags;

pub use error::ImportError;
pub use importer::{check_import_file, import_associations, ImportOptions};
pub use parse::{parse_import_file, ParsedImportFile};
pub use reconcile::ImportMode;
