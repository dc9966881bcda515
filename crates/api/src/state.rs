use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jobs::InMemJobs;
use sched_core::store::MemStore;
use scheduler::{Generation, SchedulerConfig};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemStore>,
    pub jobs: Arc<InMemJobs<Generation<MemStore>>>,
}

impl AppState {
    pub fn new(store: Arc<MemStore>, config: SchedulerConfig) -> Self {
        let jobs = InMemJobs::new(Generation::new(store.clone(), config));
        Self {
            store,
            jobs: Arc::new(jobs),
        }
    }
}

/// Identity headers as forwarded by the identity provider in front of the
/// service.
#[derive(Clone, Debug, Default)]
pub struct Caller {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(Caller {
            user_id: header("x-user-id"),
            role: header("x-user-role").map(|r| r.to_ascii_lowercase()),
        })
    }
}
