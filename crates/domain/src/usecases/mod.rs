//! Application use cases / business logic

pub mod feature;
pub mod maintenance;
pub mod publish;

pub use feature::FeatureOnPublish;
pub use maintenance::{MaintenanceConfig, PinMaintenance};
pub use publish::{PublishConfig, PublishTask};
