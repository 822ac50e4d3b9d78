//! Training infrastructure: episode runner, replay buffer, metrics
//! collection, the epoch trainer and the updates it publishes.

pub mod episode;
pub mod events;
pub mod metrics;
pub mod replay_buffer;
pub mod trainer;

pub use episode::{run_episode, EpisodeTrace};
pub use events::{EpochReport, TrainingReport, TrainingUpdate};
pub use metrics::{EpisodeResult, TrainingMetrics};
pub use replay_buffer::ReplayBuffer;
pub use trainer::{Trainer, TrainerConfig};
