//! DID method resolvers.
//!
//! Each resolver implements [`DidResolver`](crate::resolver::DidResolver) for a
//! single method and performs its I/O through the collaborators in
//! [`transport`](crate::transport).

pub mod ethr;
pub mod https;
pub mod mnid;
pub mod uport;

pub use ethr::EthrResolver;
pub use https::HttpsResolver;
pub use uport::UportResolver;
