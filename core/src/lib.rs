pub mod confirmation;
pub mod error;
pub mod normalize;
pub mod outcome;
pub mod validate;

pub use confirmation::{CallContext, PendingConfirmation, check_confirmation, extract_confirmed};
pub use error::{ToolError, codes};
pub use normalize::{Fallback, SequenceInput};
pub use outcome::{RemoteError, RemoteOutcome, ResponseMetadata};
pub use validate::PortDefinition;
