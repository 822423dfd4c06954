pub use tokio;

pub use range::Range;
pub use scale::Scalable;

mod range;
mod scale;
pub mod task;
