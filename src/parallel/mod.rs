pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, calculate_many};
pub use pool::WorkerPool;
