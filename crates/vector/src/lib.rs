pub mod error;
pub mod filter;
pub mod gateway;
pub mod retry;

pub use error::{VectorError, VectorResult};
pub use filter::{FilterTerm, VectorFilter};
pub use gateway::{SearchHit, VectorGateway, VectorPoint};
pub use retry::RetryPolicy;
