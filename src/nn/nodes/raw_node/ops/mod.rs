mod add;
mod avg_pool2d;
mod channel_mean;
mod conv2d;
mod max_pool2d;
mod mean;
mod multiply;
mod tanh;

pub(crate) use add::Add;
pub(crate) use avg_pool2d::AvgPool2d;
pub(crate) use channel_mean::ChannelMean;
pub(crate) use conv2d::Conv2d;
pub(crate) use max_pool2d::MaxPool2d;
pub(crate) use mean::Mean;
pub(crate) use multiply::Multiply;
pub(crate) use tanh::Tanh;
