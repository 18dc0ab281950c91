mod task_id;
pub use task_id::TaskId;

mod task;
pub use task::{Task, TaskSeconds};

mod task_status;
pub use task_status::{TaskStatus, UnknownStatus};

mod task_record;
pub use task_record::{FAILURE_EXIT_CODE, TaskRecord, TransitionError};
