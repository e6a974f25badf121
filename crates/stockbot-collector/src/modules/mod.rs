//! 기준 데이터 동기화 모듈.

pub mod batch;
pub mod coordinator;
pub mod stock_sync;
pub mod sync_status;
pub mod worker_pool;

pub use batch::{split_into_batches, Batch};
pub use coordinator::BatchSyncCoordinator;
pub use stock_sync::{failed_markets, StockSyncService};
pub use sync_status::SyncStatusRecorder;
pub use worker_pool::{BatchOutcome, BatchPersister, BatchResult, BatchWorkerPool, ResultAggregator};
