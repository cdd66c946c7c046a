//! Input spreadsheet ingestion

pub mod excel_date;
pub mod loader;
pub mod phone;
pub mod sheet;

pub use loader::{load_customers, load_sales, CustomerRecord, SaleRecord};
pub use phone::NormalizedPhone;
