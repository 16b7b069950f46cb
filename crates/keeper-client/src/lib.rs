//! Client side of the Keeper secrets service.
//!
//! [`ApiClient`] speaks the server's unary and streaming protocol and
//! implements [`keeper_secrets::SecretsApi`], so it can back a
//! [`keeper_secrets::RemoteSecretStore`]. [`NotificationListener`] keeps a
//! notification stream open in the background.

pub mod client;
pub mod interceptor;
pub mod notification;

pub use client::{ApiClient, DownloadReceipt, UploadReceipt};
pub use interceptor::CallInterceptor;
pub use notification::{ClientEvent, NotificationListener, NotificationSource};
