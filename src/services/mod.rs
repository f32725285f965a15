pub mod backend;
pub mod channel;
pub mod dispatcher;
pub mod focus_source;
pub mod forwarder;

pub use backend::KeydBackend;
pub use dispatcher::Dispatcher;
pub use focus_source::{detect_focus_source, Detection};
pub use forwarder::Forwarder;
