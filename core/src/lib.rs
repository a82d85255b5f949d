//! Blocking client for the Customer.io track and app APIs.
//!
//! # Overview
//! `TrackClient` sends customer profiles, events, devices and segment
//! membership to the track API (HTTP Basic auth with site id + API key).
//! `ApiClient` sends transactional email/push and manages collections on
//! the app API (bearer token).
//!
//! # Design
//! - Both clients are thin façades: they validate identifiers, build a URL
//!   with percent-encoded path segments, and pass a `Payload` to the
//!   `Dispatcher`.
//! - The dispatcher sanitizes the payload (timestamps to epoch seconds, NaN
//!   to null), attaches auth and user agent, retries transport failures with
//!   exponential backoff, and accepts only HTTP 200.
//! - All failures surface as one `Error` type.
//! - Network I/O sits behind the `Transport` trait; `UreqTransport` is the
//!   default and keeps a lazily built, shared connection pool.
//!
//! ```no_run
//! use customerio::{Attributes, TrackClient};
//!
//! # fn main() -> customerio::Result<()> {
//! let client = TrackClient::builder("site_id", "api_key").region("eu").build()?;
//! client.identify(5, Attributes::new().with("email", "customer@example.com"))?;
//! client.track(5, "purchased", Attributes::new().with("price", 23.45))?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod http;
pub mod region;
pub mod requests;
pub mod retry;
pub mod sanitize;
pub mod track;
pub mod transport;

pub use api::{ApiClient, ApiClientBuilder};
pub use config::{track_base_url, ClientConfig, ConnectionMode, Credentials};
pub use dispatch::{Dispatcher, USER_AGENT};
pub use encode::{encode, Identifier};
pub use error::{Error, Result, STATUS_PAGE};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use region::Region;
pub use requests::{MessageId, SendEmailRequest, SendPushRequest};
pub use retry::RetryPolicy;
pub use sanitize::{sanitize, AttributeValue, Attributes, Payload};
pub use track::{EventTime, IdentifierType, TrackClient, TrackClientBuilder};
pub use transport::UreqTransport;
