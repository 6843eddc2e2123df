//! ccspredict-data — Reading measured CCS tables.
//!
//! Two formats are understood:
//! - the working format: one header row, `;`-delimited columns
//!   `Adduct;MZ;Smiles;InChI;CcsValue` (header case is ignored)
//! - CCSbase comma-separated exports, which [`convert_ccsbase`] rewrites into
//!   the working format

pub mod loader;
pub mod convert;

pub use loader::{load_records, load_sources, DEFAULT_DELIMITER};
pub use convert::{convert_ccsbase, ConversionReport};
