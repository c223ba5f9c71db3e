//! # Remote Module
//!
//! GraphQL access to the remote list service.
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐     ┌──────────────────────┐
//! │ operations.rs  │────►│ client.rs        │────►│ transport.rs         │
//! │ typed queries  │     │ envelope + retry │     │ HttpTransport seam   │
//! │ + wire types   │     │ RemoteClient     │     │ ReqwestTransport     │
//! └────────────────┘     └──────────────────┘     └──────────────────────┘
//! ```

pub mod client;
pub mod operations;
pub mod transport;

pub use client::{CredentialProvider, RemoteClient, RetryPolicy};
pub use operations::{GraphQlOperation, RemoteStatus};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
