mod conv2d;

pub use conv2d::conv2d;
