//! Agents: the common traits, the DQN learner, the random baseline and the
//! epsilon-greedy exploration wrapper with its ε schedules.

mod agent;
pub mod algorithms;
pub mod exploration;
pub mod networks;
mod random;
pub mod schedule;

pub use agent::{Agent, TrainableAgent, Transition, UpdateMetrics};
pub use algorithms::{DqnAgent, DqnConfig};
pub use exploration::{ActionHistogram, EpsilonGreedy, ExplorationConfig};
pub use networks::{QNetwork, QNetworkConfig};
pub use random::RandomAgent;
pub use schedule::{EpsilonSchedule, ExplorationRate};
