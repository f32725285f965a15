pub mod window;

pub use window::{ChannelEvent, WindowIdentity, WindowInfo};
