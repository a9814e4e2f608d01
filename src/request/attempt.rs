use crate::request::api_request::ApiRequest;

/// One send of a request. An `Original` may be turned into a `Retry` once;
/// a `Retry` has no successor, so a request is sent at most twice.
#[derive(Debug, Clone, Copy)]
pub enum Attempt<'a> {
    Original(&'a ApiRequest),
    Retry(&'a ApiRequest),
}

impl<'a> Attempt<'a> {
    pub fn original(request: &'a ApiRequest) -> Self {
        Attempt::Original(request)
    }

    /// The single permitted replay, `None` if this already is one.
    pub fn retry(self) -> Option<Attempt<'a>> {
        match self {
            Attempt::Original(request) => Some(Attempt::Retry(request)),
            Attempt::Retry(_) => None,
        }
    }

    pub fn request(&self) -> &'a ApiRequest {
        match self {
            Attempt::Original(request) | Attempt::Retry(request) => request,
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Attempt::Retry(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attempt::Original(_) => "original",
            Attempt::Retry(_) => "retry",
        }
    }
}
