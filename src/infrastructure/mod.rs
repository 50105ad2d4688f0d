// Infrastructure layer - Adapters, wire formats and the transform worker
pub mod chunked_stream;
pub mod config;
pub mod http_response;
pub mod worker;
pub mod worker_protocol;
