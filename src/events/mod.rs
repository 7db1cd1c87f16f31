pub mod publisher;

pub use publisher::{ResponseEvent, ResponseEventPublisher};
