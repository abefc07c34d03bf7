pub mod event;
pub mod fanout;
pub mod observer;

pub use event::LiveEvent;
pub use fanout::{FanoutRegistry, PublishReport};
pub use observer::{ChannelObserver, Observer, ObserverError, ObserverId};
