// Application layer - Use cases over the pure engine
pub mod data_stream;
pub mod offload;
pub mod pipeline;
pub mod transform_executor;
pub mod transform_venue;
