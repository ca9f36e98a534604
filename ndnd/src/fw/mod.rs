pub mod best_route;
pub mod forwarder;
pub mod multicast;
pub mod shortcut_opt;
pub mod strategy;
pub mod unsolicited_data_policy;

pub use best_route::BestRouteStrategy;
pub use forwarder::{Forwarder, ForwarderConfig, ForwarderCounters};
pub use multicast::MulticastStrategy;
pub use shortcut_opt::ShortcutOpt;
pub use strategy::Strategy;
pub use unsolicited_data_policy::{UnsolicitedDataDecision, UnsolicitedDataPolicy};
