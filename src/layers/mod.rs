pub mod batch_norm;
pub mod conv2d;
pub mod dense;

pub use batch_norm::{BatchNorm, MovingAverageUpdate};
pub use conv2d::{Conv2d, Padding};
pub use dense::Dense;
