// Application state for HTTP handlers
use crate::application::data_stream::DataStreamService;
use crate::application::pipeline::TransformPipeline;
use crate::domain::generator::GeneratorState;

#[derive(Clone)]
pub struct AppState {
    pub stream_service: DataStreamService,
    pub pipeline: TransformPipeline,
    /// Model used for one-off datasets served by `/api/data`.
    pub generator_state: GeneratorState,
}
