//! Hooks that observe responses as they pass through the client.

use crate::response::{ResponseType, WireResponse};
use std::fmt;
use std::sync::Arc;

/// Receives every terminal response after the client has updated its own state.
///
/// # Examples
///
/// ```
/// use wire_client::{StateHook, WireResponse};
///
/// struct Logger;
///
/// impl StateHook for Logger {
///     fn receive(&self, response: &WireResponse) {
///         println!("got {:?}", response.response_type());
///     }
/// }
/// ```
pub trait StateHook: Send + Sync {
    /// Called once per terminal response.
    fn receive(&self, response: &WireResponse);
}

/// Which response types a callback wants to see.
///
/// # Examples
///
/// ```
/// use wire_client::{ResponseFilter, ResponseType};
///
/// let one: ResponseFilter = ResponseType::Login.into();
/// let many: ResponseFilter = [ResponseType::Users, ResponseType::Clients].into();
///
/// assert!(one.matches(ResponseType::Login));
/// assert!(!many.matches(ResponseType::Error));
/// assert!(ResponseFilter::Any.matches(ResponseType::Error));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseFilter {
    /// Every response.
    #[default]
    Any,
    /// Only responses of one of these types.
    Types(Vec<ResponseType>),
}

impl ResponseFilter {
    /// Returns `true` if a response of `response_type` passes the filter.
    pub fn matches(&self, response_type: ResponseType) -> bool {
        match self {
            ResponseFilter::Any => true,
            ResponseFilter::Types(types) => types.contains(&response_type),
        }
    }
}

impl From<ResponseType> for ResponseFilter {
    fn from(response_type: ResponseType) -> Self {
        ResponseFilter::Types(vec![response_type])
    }
}

impl From<Vec<ResponseType>> for ResponseFilter {
    fn from(types: Vec<ResponseType>) -> Self {
        ResponseFilter::Types(types)
    }
}

impl<const N: usize> From<[ResponseType; N]> for ResponseFilter {
    fn from(types: [ResponseType; N]) -> Self {
        ResponseFilter::Types(types.to_vec())
    }
}

/// A registered response handler.
#[derive(Clone)]
pub struct ResponseCallback {
    handler: Arc<dyn Fn(&WireResponse) + Send + Sync>,
    filter: ResponseFilter,
}

impl ResponseCallback {
    /// Creates a callback for responses matching `filter`.
    pub fn new<F>(handler: F, filter: ResponseFilter) -> Self
    where
        F: Fn(&WireResponse) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            filter,
        }
    }

    /// Invokes the handler if the response passes the filter.
    ///
    /// Returns whether the handler ran.
    pub fn dispatch(&self, response: &WireResponse) -> bool {
        if !self.filter.matches(response.response_type()) {
            return false;
        }
        (self.handler)(response);
        true
    }
}

impl fmt::Debug for ResponseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCallback")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
