pub mod cache;
pub mod probe;
pub mod transport;

pub use cache::{FetchCache, FetchMode, FetchOptions};
pub use probe::{probe_extensions, PROBE_EXTENSIONS, PROBE_STEMS};
pub use transport::{FetchError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
