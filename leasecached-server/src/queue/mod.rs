pub mod command_queue;

pub use command_queue::{ClientAddress, CommandQueue, MIN_COMMAND_SCRATCH_SIZE};
