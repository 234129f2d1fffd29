pub mod batch;
pub mod cut;
pub mod queue;

pub use batch::BatchBuffer;
pub use cut::{MIN_CUT_SIZE, cut_point};
pub use queue::{BacklogReceiver, BacklogSender, EnqueueError, backlog};
