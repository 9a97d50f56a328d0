//! Stateful HTTP call wrapper: sequences one request → response → body
//! exchange and exposes assertion-producing methods as steps.

mod client;
mod schema;

pub use client::{Headers, HttpClient, Method, Request, ReqwestClient, Response, StatusCode, Url};
pub use schema::{DefaultValidator, SchemaValidator, Validation};

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::assert::any_error;
use crate::diff::{pretty_diff, text_diff};
use crate::error::StepError;
use crate::step::NamedStep;

struct CallState {
    client: Box<dyn HttpClient>,
    validator: Box<dyn SchemaValidator>,
    request: Option<Request>,
    response: Option<Response>,
    body: Option<Vec<u8>>,
}

/// All the state relating to a single HTTP exchange: at most one pending
/// request, at most one received response, at most one cached body per
/// request cycle.
///
/// Cloning yields another handle to the same exchange, which is how the
/// step constructors share the state they mutate. An `HttpCall` is for
/// exclusive use within one sequential test flow; it is deliberately not
/// `Send`.
#[derive(Clone)]
pub struct HttpCall {
    state: Rc<RefCell<CallState>>,
}

impl Default for HttpCall {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpCall {
    /// A call using the default reqwest-backed transport.
    pub fn new() -> Self {
        Self::with_client(Box::new(ReqwestClient::default()))
    }

    /// A call using an injected transport.
    pub fn with_client(client: Box<dyn HttpClient>) -> Self {
        Self {
            state: Rc::new(RefCell::new(CallState {
                client,
                validator: Box::new(DefaultValidator),
                request: None,
                response: None,
                body: None,
            })),
        }
    }

    /// Replace the JSON-schema validator.
    pub fn with_validator(self, validator: Box<dyn SchemaValidator>) -> Self {
        self.state.borrow_mut().validator = validator;
        self
    }

    /// `None` iff no request has been set.
    pub fn assert_no_request(&self) -> Option<StepError> {
        if self.state.borrow().request.is_none() {
            None
        } else {
            Some(StepError::Precondition("request already set".to_owned()))
        }
    }

    /// `None` iff a request has been set.
    pub fn assert_request(&self) -> Option<StepError> {
        if self.state.borrow().request.is_some() {
            None
        } else {
            Some(StepError::Precondition("no request set".to_owned()))
        }
    }

    /// `None` iff no response has been received.
    pub fn assert_no_response(&self) -> Option<StepError> {
        if self.state.borrow().response.is_none() {
            None
        } else {
            Some(StepError::Precondition("response already set".to_owned()))
        }
    }

    /// Idempotent: performs the exchange through the injected client if it
    /// has not happened yet. Fails when no request has been set.
    pub fn ensure_response(&self) -> Result<(), StepError> {
        let mut state = self.state.borrow_mut();
        if state.response.is_some() {
            log::trace!("response already received");
            return Ok(());
        }
        let response = {
            let request = state.request.as_ref().ok_or_else(|| {
                StepError::Precondition("cannot ensure response: no request set".to_owned())
            })?;
            state.client.perform(request)?
        };
        log::debug!("received response: {}", response.status);
        state.response = Some(response);
        Ok(())
    }

    /// Idempotent: ensures a response, then reads and caches the full body.
    /// The body stream is closed before returning, read error or not.
    pub fn receive_body(&self) -> Result<(), StepError> {
        self.ensure_response()?;
        let mut state = self.state.borrow_mut();
        if state.body.is_some() {
            log::trace!("body already received");
            return Ok(());
        }
        let Some(mut stream) = state.response.as_mut().and_then(Response::take_stream) else {
            return Err(StepError::Precondition(
                "response body stream already consumed".to_owned(),
            ));
        };
        let mut buffer = Vec::new();
        // a failed read still drops (closes) the stream on the way out
        stream.read_to_end(&mut buffer)?;
        state.body = Some(buffer);
        Ok(())
    }

    /// Idempotent teardown: clears the request, drains an unread response
    /// body before discarding the response, and clears the body cache. Safe
    /// to call repeatedly and on a never-used instance.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.request = None;
        if let Some(mut response) = state.response.take() {
            if state.body.is_none() {
                if let Some(mut stream) = response.take_stream() {
                    let _ = io::copy(&mut stream, &mut io::sink());
                }
            }
        }
        state.body = None;
    }

    /// The cached response body, if it has been received.
    pub fn response_body(&self) -> Option<Vec<u8>> {
        self.state.borrow().body.clone()
    }

    fn with_response<T>(
        &self,
        inspect: impl FnOnce(&Response) -> Result<T, StepError>,
    ) -> Result<T, StepError> {
        self.ensure_response()?;
        let state = self.state.borrow();
        match state.response.as_ref() {
            Some(response) => inspect(response),
            None => Err(StepError::Precondition("no response".to_owned())),
        }
    }

    fn with_body<T>(
        &self,
        inspect: impl FnOnce(&[u8]) -> Result<T, StepError>,
    ) -> Result<T, StepError> {
        self.receive_body()?;
        let state = self.state.borrow();
        match state.body.as_deref() {
            Some(body) => inspect(body),
            None => Err(StepError::Precondition("no response body".to_owned())),
        }
    }

    /// Step: reset this call and construct a new request. Method or URL
    /// parse failures fail the step.
    pub fn new_request(&self, method: &str, url: &str, body: Option<&str>) -> NamedStep {
        let call = self.clone();
        let name = format!("new_request({method} {url})");
        let method = method.to_owned();
        let url = url.to_owned();
        let body = body.map(str::to_owned);
        NamedStep::new(name, move || {
            call.reset();
            let method = Method::from_bytes(method.as_bytes())
                .map_err(|e| StepError::InvalidRequest(format!("bad method `{method}`: {e}")))?;
            let url = Url::parse(&url)
                .map_err(|e| StepError::InvalidRequest(format!("bad url `{url}`: {e}")))?;
            let mut request = Request::new(method, url);
            request.body = body.clone();
            call.state.borrow_mut().request = Some(request);
            Ok(())
        })
    }

    /// Step: set a header on the pending request. Valid only after
    /// `new_request` and before the response has been received.
    pub fn request_header(&self, key: &str, value: &str) -> NamedStep {
        let call = self.clone();
        let name = format!("request_header({key}: {value})");
        let key = key.to_owned();
        let value = value.to_owned();
        NamedStep::new(name, move || {
            if let Some(error) = any_error([call.assert_request(), call.assert_no_response()]) {
                return Err(error);
            }
            let header = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| StepError::InvalidRequest(format!("bad header name `{key}`: {e}")))?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                StepError::InvalidRequest(format!("bad header value `{value}`: {e}"))
            })?;
            if let Some(request) = call.state.borrow_mut().request.as_mut() {
                request.headers.insert(header, header_value);
            }
            Ok(())
        })
    }

    /// Step: perform the exchange without asserting anything about it.
    /// Steps that inspect the response do this on demand; use `call` when
    /// the test only cares that the request fires.
    pub fn call(&self) -> NamedStep {
        let call = self.clone();
        NamedStep::new("call", move || call.ensure_response())
    }

    /// Step: assert the response status code.
    pub fn response_status_equals(&self, status: u16) -> NamedStep {
        let call = self.clone();
        NamedStep::new(format!("response_status_equals({status})"), move || {
            call.with_response(|response| {
                let found = response.status.as_u16();
                if found == status {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "status: expected {status}, found {found}"
                    )))
                }
            })
        })
    }

    /// Step: assert the header key exists, matching the stored key exactly
    /// (case-sensitive). Says nothing about the header's value.
    pub fn response_header_exists(&self, key: &str) -> NamedStep {
        let call = self.clone();
        let name = format!("response_header_exists({key})");
        let key = key.to_owned();
        NamedStep::new(name, move || {
            call.with_response(|response| {
                if response.headers.contains_key(&key) {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!("header '{key}' not found")))
                }
            })
        })
    }

    /// Step: assert the header key does not exist, matching the stored key
    /// exactly (case-sensitive).
    pub fn response_header_not_exists(&self, key: &str) -> NamedStep {
        let call = self.clone();
        let name = format!("response_header_not_exists({key})");
        let key = key.to_owned();
        NamedStep::new(name, move || {
            call.with_response(|response| {
                if response.headers.contains_key(&key) {
                    Err(StepError::Mismatch(format!("header '{key}' found")))
                } else {
                    Ok(())
                }
            })
        })
    }

    /// Step: assert the header's value is exactly `value`. The key lookup
    /// is case-insensitive; the failure message carries an inline diff.
    pub fn response_header_equals(&self, key: &str, value: &str) -> NamedStep {
        let call = self.clone();
        let name = format!("response_header_equals({key}: {value})");
        let key = key.to_owned();
        let value = value.to_owned();
        NamedStep::new(name, move || {
            call.with_response(|response| {
                let found = response.headers.get(&key).unwrap_or("");
                if found == value {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "header '{key}': diff: {}",
                        text_diff(&value, found)
                    )))
                }
            })
        })
    }

    /// Step: assert the header's value contains `value` as a substring.
    /// The key lookup is case-insensitive.
    pub fn response_header_contains(&self, key: &str, value: &str) -> NamedStep {
        let call = self.clone();
        let name = format!("response_header_contains({key}: {value})");
        let key = key.to_owned();
        let value = value.to_owned();
        NamedStep::new(name, move || {
            call.with_response(|response| {
                let found = response.headers.get(&key).unwrap_or("");
                if found.contains(&value) {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "header '{key}': expected '{value}', found '{found}'"
                    )))
                }
            })
        })
    }

    /// Step: assert the body is exactly `value`; the failure message
    /// carries an inline diff.
    pub fn response_body_equals(&self, value: &str) -> NamedStep {
        let call = self.clone();
        let value = value.to_owned();
        NamedStep::new("response_body_equals", move || {
            call.with_body(|body| {
                let body = String::from_utf8_lossy(body);
                if body == value {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "body: diff: {}",
                        text_diff(&value, &body)
                    )))
                }
            })
        })
    }

    /// Step: assert the body contains `value` as a substring.
    pub fn response_body_contains(&self, value: &str) -> NamedStep {
        let call = self.clone();
        let value = value.to_owned();
        NamedStep::new("response_body_contains", move || {
            call.with_body(|body| {
                let body = String::from_utf8_lossy(body);
                if body.contains(&value) {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "body: expected '{value}', found '{body}'"
                    )))
                }
            })
        })
    }

    /// Step: assert the body matches the regular expression.
    pub fn response_body_matches(&self, pattern: Regex) -> NamedStep {
        let call = self.clone();
        let name = format!("response_body_matches({pattern})");
        NamedStep::new(name, move || {
            call.with_body(|body| {
                let body = String::from_utf8_lossy(body);
                if pattern.is_match(&body) {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "body: expected to match pattern '{pattern}', found '{body}'"
                    )))
                }
            })
        })
    }

    /// Step: validate the body against a JSON schema. Validator-internal
    /// errors surface as-is; validation failures aggregate every violation
    /// into one message.
    pub fn response_body_json_schema(&self, schema: &str) -> NamedStep {
        let call = self.clone();
        let schema = schema.to_owned();
        NamedStep::new("response_body_json_schema", move || {
            call.receive_body()?;
            let document = match call.response_body() {
                Some(body) => String::from_utf8_lossy(&body).into_owned(),
                None => {
                    return Err(StepError::Precondition("no response body".to_owned()));
                }
            };
            let validation = {
                let state = call.state.borrow();
                state.validator.validate(&schema, &document)?
            };
            if validation.valid {
                Ok(())
            } else {
                let mut message = String::from("validation failure:");
                for violation in &validation.violations {
                    message.push_str("\n\t");
                    message.push_str(violation);
                }
                Err(StepError::Mismatch(message))
            }
        })
    }

    /// Step: parse the body as JSON into `T` and compare structurally with
    /// `expected`. The failure message is a line diff with `-` marking what
    /// the body held and `+` what was expected.
    pub fn response_body_json_matches<T>(&self, expected: T) -> NamedStep
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let call = self.clone();
        NamedStep::new("response_body_json_matches", move || {
            call.with_body(|body| {
                let parsed: T = serde_json::from_slice(body)?;
                let diff = pretty_diff(&parsed, &expected)?;
                if diff.is_empty() {
                    Ok(())
                } else {
                    Err(StepError::Mismatch(format!(
                        "did not match expected value (-got +want):\n{diff}"
                    )))
                }
            })
        })
    }
}
