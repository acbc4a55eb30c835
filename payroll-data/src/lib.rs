//! Bulk loaders: bracket tables from CSV and line items from CSV.

mod line_items;
mod tax_tables;

pub use line_items::{LineItemImportError, LineItemImporter, LineItemRow};
pub use tax_tables::{LoadSummary, TaxTableLoader, TaxTableLoaderError, TaxTableRecord};
