use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::models::ProviderParams;
use crate::orchestration::types::{
    GenerationProvider, ItemContext, LifecycleState, ProviderError, ProviderResponse,
};

/// One scripted reply from the provider
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Accept(LifecycleState),
    Fail(ProviderError),
    /// Panic inside `generate`, standing in for a provider client bug
    Panic(String),
}

impl Default for ScriptedResponse {
    fn default() -> Self {
        Self::Accept(LifecycleState::Queued)
    }
}

/// Provider double with per-item scripts, optional latency and an
/// in-flight counter.
///
/// Each item consumes its script front to back, then falls back to the
/// default response.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    default_response: ScriptedResponse,
    scripts: Mutex<HashMap<Uuid, VecDeque<ScriptedResponse>>>,
    latency: Duration,
    calls: Mutex<HashMap<Uuid, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, response: ScriptedResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn with_script(self, item_id: Uuid, responses: Vec<ScriptedResponse>) -> Self {
        self.scripts.lock().insert(item_id, responses.into());
        self
    }

    /// Simulated call duration, observed with `tokio::time::sleep`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls_for(&self, item_id: &Uuid) -> usize {
        self.calls.lock().get(item_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Highest number of `generate` calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, item_id: Uuid) -> ScriptedResponse {
        self.scripts
            .lock()
            .get_mut(&item_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_response.clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        context: &ItemContext,
        _params: &ProviderParams,
    ) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().entry(context.item_id).or_insert(0) += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.next_response(context.item_id) {
            ScriptedResponse::Accept(state) => Ok(ProviderResponse {
                handle: format!("job-{}-{}", context.slide_number, self.calls_for(&context.item_id)),
                state,
            }),
            ScriptedResponse::Fail(error) => Err(error),
            ScriptedResponse::Panic(message) => panic!("{message}"),
        }
    }
}
