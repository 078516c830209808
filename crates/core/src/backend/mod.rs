//! Upstream language-model backends.

mod azure;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod traits;

pub use azure::AzureOpenAiBackend;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptStep, ScriptedBackend};
pub use traits::{CompletionBackend, Fragment, FragmentStream};
