//! S3 implementation of the remote store interface.
//!
//! Published atlas datasets live in public S3 buckets readable without
//! credentials, so the client is configured for anonymous access. The
//! client is constructed explicitly and owned by the store; there is no
//! process-global client state.

mod store;

pub use store::S3RemoteStore;
