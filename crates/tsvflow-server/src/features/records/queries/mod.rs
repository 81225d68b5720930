pub mod list;

pub use list::{paginate, ListRecordsError, ListRecordsQuery, ListRecordsResponse};
