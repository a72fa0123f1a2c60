//! Network supervisor specs.

mod fan_out_chain;
mod linear_pipeline;
mod subscription_lifetime;
