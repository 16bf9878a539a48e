mod decision;
mod swipe_queue;

pub use decision::{CollectionRole, Decision};
pub use swipe_queue::SwipeQueue;
