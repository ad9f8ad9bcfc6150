use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use sonic_rs::to_vec;

use super::adapter::{
    RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse, RestResult,
    RestTransport, RestTransportState,
};

/// Scripted outcome for one transport execution. Behaviors are consumed in
/// FIFO order; an exhausted plan defaults to `Pass`.
#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Pass,
    ConnectError {
        status: Option<u16>,
        reason: String,
    },
    SendError {
        status: Option<u16>,
        reason: String,
    },
    ReceiveError {
        status: Option<u16>,
        reason: String,
    },
    TimeoutError {
        status: Option<u16>,
        reason: String,
    },
    InternalError {
        reason: String,
    },
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn connect_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::ConnectError {
            status,
            reason: reason.into(),
        }
    }

    pub fn send_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::SendError {
            status,
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::ReceiveError {
            status,
            reason: reason.into(),
        }
    }

    pub fn timeout_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::TimeoutError {
            status,
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    pub fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.request.len()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<RestBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize>(status: u16, payload: &T) -> RestResult<Self> {
        let body = to_vec(payload).map_err(RestError::from)?;
        Ok(Self::new(status, body))
    }
}

#[derive(Clone, Debug)]
pub struct MockRestStateSnapshot {
    pub state: RestTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub elapsed_total: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct MockRestAdapterState {
    state: RestTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    outbound_log: Vec<RestRequest>,
    inbound_log: Vec<RestResponse>,
    last_error: Option<String>,
    elapsed_total: Duration,
}

impl MockRestAdapterState {
    fn snapshot(&self) -> MockRestStateSnapshot {
        MockRestStateSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.remaining(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            inbound_count: self.inbound_log.len(),
            outbound_count: self.outbound_log.len(),
            elapsed_total: self.elapsed_total,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for MockRestAdapterState {
    fn default() -> Self {
        Self {
            state: RestTransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            route_response_queues: HashMap::new(),
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            last_error: None,
            elapsed_total: Duration::from_millis(0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockRestAdapter {
    state: Arc<Mutex<MockRestAdapterState>>,
}

impl MockRestAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockRestAdapterState::default())),
        }
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let mut state = MockRestAdapterState::default();
        state.behavior_plan = behavior_plan;
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> MockRestStateSnapshot {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while taking snapshot")
            .snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(
        &self,
        method: Method,
        url: impl Into<String>,
        response: MockResponse,
    ) {
        let key = (method, url.into());
        self.state
            .lock()
            .expect("mock transport mutex poisoned while queueing response by route")
            .route_response_queues
            .entry(key)
            .or_default()
            .push_back(response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    /// Every request the transport has executed, in order. Tests assert on
    /// the recorded headers and body bytes.
    pub fn outbound_requests(&self) -> Vec<RestRequest> {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading outbound log")
            .outbound_log
            .clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading outbound count")
            .outbound_log
            .len()
    }

    pub fn inbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading inbound count")
            .inbound_log
            .len()
    }

    pub fn clear_logs(&self) {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while clearing logs");
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    fn pop_behavior(&self) -> MockBehavior {
        self.state
            .lock()
            .expect("mock transport mutex poisoned while reading behavior plan")
            .behavior_plan
            .pop()
    }

    fn next_response(&self, request: &RestRequest) -> Option<MockResponse> {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while selecting response");
        let route_key = (request.method.clone(), request.url.clone());
        if let Some(queue) = state.route_response_queues.get_mut(&route_key) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }
        state.default_response_queue.pop_front()
    }

    fn push_inbound_log(&self, response: RestResponse) {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while pushing inbound log");
        state.inbound_log.push(response);
    }

    fn push_outbound_log(&self, request: RestRequest) {
        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while pushing outbound log");
        state.outbound_log.push(request);
    }

    fn error(
        &self,
        kind: RestErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> RestError {
        let message = message.into();
        let error = match kind {
            RestErrorKind::Connect => RestError::connect(message.clone(), status),
            RestErrorKind::Send => RestError::send(message.clone(), status),
            RestErrorKind::Receive => RestError::receive(message.clone(), status),
            RestErrorKind::Timeout => RestError::timeout(message.clone(), status),
            RestErrorKind::Encode => RestError::encode(message.clone()),
            RestErrorKind::Internal => RestError::internal(message.clone()),
        };

        let mut state = self
            .state
            .lock()
            .expect("mock transport mutex poisoned while recording error");
        state.state = RestTransportState::Error;
        state.last_error = Some(message);
        state.last_status = status;
        error
    }
}

impl Default for MockRestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for MockRestAdapter {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let adapter = self.clone();
        Box::pin(async move {
            let behavior = adapter.pop_behavior();

            let start = Instant::now();
            adapter.push_outbound_log(request.clone());

            let mut state = adapter
                .state
                .lock()
                .expect("mock transport mutex poisoned while updating state before execute");
            state.request_count += 1;
            state.last_url = Some(request.url.clone());
            state.state = RestTransportState::Busy;
            state.last_error = None;
            drop(state);

            match behavior {
                MockBehavior::ConnectError { status, reason } => {
                    return Err(adapter.error(RestErrorKind::Connect, status, reason));
                }
                MockBehavior::SendError { status, reason } => {
                    return Err(adapter.error(RestErrorKind::Send, status, reason));
                }
                MockBehavior::ReceiveError { status, reason } => {
                    return Err(adapter.error(RestErrorKind::Receive, status, reason));
                }
                MockBehavior::TimeoutError { status, reason } => {
                    return Err(adapter.error(RestErrorKind::Timeout, status, reason));
                }
                MockBehavior::InternalError { reason } => {
                    return Err(adapter.error(RestErrorKind::Internal, None, reason));
                }
                MockBehavior::Pass => {}
            }

            match adapter.next_response(&request) {
                Some(response) => {
                    let elapsed = start.elapsed();
                    let response = RestResponse {
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                        elapsed,
                    };
                    adapter.push_inbound_log(response.clone());
                    {
                        let mut state = adapter
                            .state
                            .lock()
                            .expect("mock transport mutex poisoned while recording inbound response");
                        state.last_status = Some(response.status);
                        state.state = RestTransportState::Idle;
                        state.elapsed_total += elapsed;
                    }
                    Ok(response)
                }
                None => {
                    let fallback = RestResponse {
                        status: 200,
                        headers: Vec::new(),
                        body: Bytes::new(),
                        elapsed: start.elapsed(),
                    };
                    adapter.push_inbound_log(fallback.clone());
                    {
                        let mut state = adapter
                            .state
                            .lock()
                            .expect("mock transport mutex poisoned while recording fallback response");
                        state.last_status = Some(200);
                        state.state = RestTransportState::Idle;
                    }
                    Ok(fallback)
                }
            }
        })
    }
}
