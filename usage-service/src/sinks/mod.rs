pub mod aggregate;

pub use aggregate::AggregateSink;
