pub mod confirmation;
pub mod engine;
pub mod events;
pub mod http;
pub mod jito;

pub use {
    confirmation::{ConfirmationHandle, ConfirmationSignal, ConfirmationWatcher, SlotClock},
    engine::{ExecuteRequest, SubmissionEngine},
    events::{EventBus, PipelineEvent},
    http::{TpuSubmitRequest, TpuSubmitResponse, handle_tpu_submit},
    jito::{BundleState, JitoClient, JitoRegion},
};
