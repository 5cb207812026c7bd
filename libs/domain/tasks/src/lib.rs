//! Task records and the stream-backed dispatcher that drives their
//! PENDING -> PROCESSING -> {COMPLETED, FAILED, CANCELLED, RETRY} lifecycle.

pub mod dispatcher;
pub mod error;
pub mod models;
pub mod repository;

pub use dispatcher::{ClaimedTask, Dispatcher, SweepReport, GROUP_NAME, STREAM_NAME};
pub use error::{TaskError, TaskResult};
pub use models::{CreateTask, StatusUpdate, StoryRecord, Task, TaskStatistics, TaskStatus};
pub use repository::{RedisTaskRepository, TaskRepository};
