mod alarm_driver;
mod alert_aggregator;
mod camera_discovery;
mod console;
mod detection_poller;
mod stats_poller;
mod stream_watcher;

pub use alarm_driver::*;
pub use alert_aggregator::*;
pub use camera_discovery::*;
pub use console::*;
pub use detection_poller::*;
pub use stats_poller::*;
pub use stream_watcher::*;
