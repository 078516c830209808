use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the liveness probe response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    #[schema(example = "healthy")]
    pub status: String,
}

/// Simple health service that can be used by any API surface
///
/// The check is unconditional: it reports that the process is serving requests, not that the
/// upstream provider is reachable.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            status: "healthy".into(),
        }
    }
}
