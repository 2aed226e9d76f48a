pub mod error;
pub mod handler;
pub mod store;
pub mod types;

pub use error::{ApiErrorBody, ApiErrorKind, ResolutionError};
pub use handler::ResolutionHandler;
pub use store::ResolutionStore;
pub use types::{
    Resolution, ResolutionDetail, ResolutionFilter, ResolutionId, ResolutionList,
    ResolutionPayload, ResolutionSummary, ResolutionTitle, ResolutionUpdated,
};
