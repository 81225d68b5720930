pub mod queries;
pub mod routes;

pub use queries::{paginate, ListRecordsError, ListRecordsQuery, ListRecordsResponse};
pub use routes::records_routes;
