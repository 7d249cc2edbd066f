/*!
# Meshpipe DevKit - Stubs and test utilities

Develop and test the relay without live infrastructure:
- In-process HTTP stub of the aggregation server (batch/delete/clear contract)
- Canned mesh gateway payload builders for decode and pipeline tests
*/

pub mod event_builder;
pub mod sink_stub;

pub use event_builder::MeshEventBuilder;
pub use sink_stub::{SinkStub, StubBehavior};
