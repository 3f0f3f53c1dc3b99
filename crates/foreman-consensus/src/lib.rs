pub mod config;
pub mod contribution;
pub mod engine;
pub mod error;
pub mod events;
pub mod order;

pub use config::ProtocolConfig;
pub use contribution::{Contribution, ContributionStatus};
pub use engine::{ConsensusEngine, WorkOrderRequest};
pub use error::{ConsensusError, Result};
pub use events::ProtocolEvent;
pub use order::{ConsensusDetails, OrderStatus, ResultMetadata, WorkOrder};
