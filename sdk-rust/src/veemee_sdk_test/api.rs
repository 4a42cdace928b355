use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use crate::{api::ApiContext, ApiError, ApiResult, Persona, VeemeeApi};

const PROVIDER: &str = "mock";

/// A call received by [`MockVeemeeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListContexts { token: String },
    ListPersonas { token: String, context_id: i64 },
    IssueDevJwt { api_key: String, email: String },
    SendMagicLink { email: String },
    ValidateMagicLink { token: String },
}

/// Result for a mocked `list_personas` call, optionally delayed to simulate
/// network latency.
pub struct MockPersonasResult {
    pub result: ApiResult<Vec<Persona>>,
    pub delay: Option<Duration>,
}

impl MockPersonasResult {
    /// Construct a result that yields the provided personas.
    pub fn personas(personas: Vec<Persona>) -> Self {
        Self {
            result: Ok(personas),
            delay: None,
        }
    }

    /// Construct a result that yields the provided error.
    pub fn error(error: ApiError) -> Self {
        Self {
            result: Err(error),
            delay: None,
        }
    }

    /// Resolve only after `delay` has elapsed.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl From<Vec<Persona>> for MockPersonasResult {
    fn from(personas: Vec<Persona>) -> Self {
        Self::personas(personas)
    }
}

impl From<ApiResult<Vec<Persona>>> for MockPersonasResult {
    fn from(result: ApiResult<Vec<Persona>>) -> Self {
        Self {
            result,
            delay: None,
        }
    }
}

#[derive(Default)]
struct MockVeemeeApiState {
    mocked_contexts: VecDeque<ApiResult<Vec<ApiContext>>>,
    mocked_personas: HashMap<i64, VecDeque<MockPersonasResult>>,
    default_personas: HashMap<i64, Vec<Persona>>,
    default_latency: Option<Duration>,
    mocked_auth: VecDeque<ApiResult<String>>,
    tracked_calls: Vec<MockCall>,
    in_flight: usize,
    max_in_flight: usize,
}

impl MockVeemeeApiState {
    fn reset(&mut self) {
        self.tracked_calls.clear();
        self.max_in_flight = self.in_flight;
    }

    fn restore(&mut self) {
        self.mocked_contexts.clear();
        self.mocked_personas.clear();
        self.default_personas.clear();
        self.default_latency = None;
        self.mocked_auth.clear();
        self.reset();
    }
}

/// A mock API for testing that tracks calls and yields predefined results.
///
/// Persona results are looked up per context: first the queue filled by
/// [`MockVeemeeApi::enqueue_personas`], then the sticky list set by
/// [`MockVeemeeApi::set_personas`].
#[derive(Default)]
pub struct MockVeemeeApi {
    state: Mutex<MockVeemeeApiState>,
}

/// Decrements the in-flight counter when a personas call ends, including when
/// the caller drops the future.
struct InFlight<'a> {
    state: &'a Mutex<MockVeemeeApiState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.in_flight -= 1;
    }
}

impl MockVeemeeApi {
    /// Construct a new mock API instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a mocked `list_contexts` result.
    pub fn enqueue_contexts(&self, result: ApiResult<Vec<ApiContext>>) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_contexts.push_back(result);
        drop(state);
        self
    }

    /// Enqueue a mocked `list_personas` result for one context.
    pub fn enqueue_personas<R>(&self, context_id: i64, result: R) -> &Self
    where
        R: Into<MockPersonasResult>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        state
            .mocked_personas
            .entry(context_id)
            .or_default()
            .push_back(result.into());
        drop(state);
        self
    }

    /// Answer every `list_personas` call for `context_id` with `personas` once
    /// the queue for that context is empty.
    pub fn set_personas(&self, context_id: i64, personas: Vec<Persona>) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.default_personas.insert(context_id, personas);
        drop(state);
        self
    }

    /// Delay applied to personas results that have no delay of their own.
    pub fn set_latency(&self, latency: Option<Duration>) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.default_latency = latency;
        drop(state);
        self
    }

    /// Enqueue a token (or error) for the auth calls that return one, and
    /// the outcome of `send_magic_link`.
    pub fn enqueue_auth(&self, result: ApiResult<String>) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_auth.push_back(result);
        drop(state);
        self
    }

    /// Retrieve the calls received so far.
    pub fn tracked_calls(&self) -> Vec<MockCall> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_calls.clone()
    }

    /// Context ids of the `list_personas` calls received so far, in call
    /// order.
    pub fn tracked_persona_context_ids(&self) -> Vec<i64> {
        let state = self.state.lock().expect("mock state poisoned");
        state
            .tracked_calls
            .iter()
            .filter_map(|call| match call {
                MockCall::ListPersonas { context_id, .. } => Some(*context_id),
                _ => None,
            })
            .collect()
    }

    /// Number of `list_personas` calls currently awaiting their result.
    pub fn in_flight(&self) -> usize {
        let state = self.state.lock().expect("mock state poisoned");
        state.in_flight
    }

    /// Highest number of simultaneous `list_personas` calls observed.
    pub fn max_in_flight(&self) -> usize {
        let state = self.state.lock().expect("mock state poisoned");
        state.max_in_flight
    }

    /// Reset tracked calls without touching enqueued results.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.reset();
    }

    /// Clear both tracked calls and enqueued results.
    pub fn restore(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.restore();
    }

    fn track(&self, call: MockCall) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.tracked_calls.push(call);
    }

    fn next_auth(&self, method: &str) -> ApiResult<String> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_auth.pop_front().unwrap_or_else(|| {
            Err(ApiError::Invariant(
                PROVIDER,
                format!("no mocked {method} results available"),
            ))
        })
    }
}

#[async_trait::async_trait]
impl VeemeeApi for MockVeemeeApi {
    async fn list_contexts(&self, token: &str) -> ApiResult<Vec<ApiContext>> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.tracked_calls.push(MockCall::ListContexts {
            token: token.to_string(),
        });

        state.mocked_contexts.pop_front().unwrap_or_else(|| {
            Err(ApiError::Invariant(
                PROVIDER,
                "no mocked contexts results available".into(),
            ))
        })
    }

    async fn list_personas(&self, token: &str, context_id: i64) -> ApiResult<Vec<Persona>> {
        let (result, delay) = {
            let mut state = self.state.lock().expect("mock state poisoned");
            state.tracked_calls.push(MockCall::ListPersonas {
                token: token.to_string(),
                context_id,
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);

            let queued = state
                .mocked_personas
                .get_mut(&context_id)
                .and_then(VecDeque::pop_front);
            match queued {
                Some(MockPersonasResult { result, delay }) => {
                    (result, delay.or(state.default_latency))
                }
                None => {
                    let result = state.default_personas.get(&context_id).cloned().ok_or_else(
                        || {
                            ApiError::Invariant(
                                PROVIDER,
                                format!("no mocked personas results available for {context_id}"),
                            )
                        },
                    );
                    (result, state.default_latency)
                }
            }
        };

        let _in_flight = InFlight { state: &self.state };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        result
    }

    async fn issue_dev_jwt(&self, api_key: &str, email: &str) -> ApiResult<String> {
        self.track(MockCall::IssueDevJwt {
            api_key: api_key.to_string(),
            email: email.to_string(),
        });
        self.next_auth("issue_dev_jwt")
    }

    async fn send_magic_link(&self, email: &str) -> ApiResult<()> {
        self.track(MockCall::SendMagicLink {
            email: email.to_string(),
        });
        self.next_auth("send_magic_link").map(|_| ())
    }

    async fn validate_magic_link(&self, token: &str) -> ApiResult<String> {
        self.track(MockCall::ValidateMagicLink {
            token: token.to_string(),
        });
        self.next_auth("validate_magic_link")
    }
}
