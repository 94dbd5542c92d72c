use bytes::Bytes;

/// Request methods recognized on the request line.
///
/// Both methods are treated alike when dispatching; the method is kept only
/// for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Fetch an asset
    GET,
    /// PUT - Submit a frame payload
    PUT,
}

/// A complete request extracted from a connection's accumulator.
///
/// Lives for exactly one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method from the last recognized request line, if any
    pub method: Option<Method>,
    /// The request URL (e.g., "/data" or "/index.html")
    pub url: String,
    /// Exactly `Content-Length` bytes following the header block
    pub body: Bytes,
}

impl Method {
    /// Parses a method token.
    ///
    /// # Example
    ///
    /// ```
    /// # use wibble::http::request::Method;
    /// assert_eq!(Method::from_str("PUT"), Some(Method::PUT));
    /// assert_eq!(Method::from_str("put"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "PUT" => Some(Method::PUT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::PUT => "PUT",
        }
    }
}

impl Request {
    /// True when the request targets the simulation endpoint.
    pub fn is_frame(&self) -> bool {
        self.url == crate::http::dispatch::FRAME_URL
    }
}
