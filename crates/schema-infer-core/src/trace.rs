/// A single captured request/response exchange with a GraphQL endpoint.
///
/// Only [`Trace::request_body`] and [`Trace::response_body`] are consumed by
/// this crate. The remaining fields are carried through so a caller's richer
/// capture format can be mapped into this one without loss, but the
/// inference pipeline never reads them.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Trace {
    pub request_body: Vec<u8>,
    pub response_body: Vec<u8>,
    pub trace_id: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
    pub status: Option<u16>,
    pub timestamp: Option<String>,
}

impl Trace {
    /// Builds a trace from just the two bodies this crate actually reads.
    pub fn new(request_body: impl Into<Vec<u8>>, response_body: impl Into<Vec<u8>>) -> Self {
        Self {
            request_body: request_body.into(),
            response_body: response_body.into(),
            trace_id: None,
            method: None,
            url: None,
            status: None,
            timestamp: None,
        }
    }
}
