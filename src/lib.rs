//! One-shot diagnostic POST against a Huawei Cloud MAS workflow conversation
//! endpoint, built on a minimal reqwest wrapper with an in-memory mock
//! transport for fully deterministic tests.

#![allow(dead_code)]

pub mod adapter;
pub mod mock;
pub mod probe;

pub use reqwest::Method;

pub use adapter::{
    Client, ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest,
    RestResponse, RestResult, RestTransport, RestTransportState,
};
pub use mock::{
    MockBehavior, MockBehaviorPlan, MockResponse, MockRestAdapter, MockRestStateSnapshot,
};
pub use probe::{
    AUTH_TOKEN_ENV, AuthToken, BODY_PREVIEW_CHARS, CONVERSATION_URL, ProbeError, ProbeReport,
    REQUEST_TIMEOUT, conversation_request, run,
};
