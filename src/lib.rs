//! Authenticated connection cache for infrastructure providers: one shared session handle,
//! single-flight refreshes, a freshness window, and bounded authentication retries.
//!
//! Build a [`cache::ConnectionCache`] from a [`config::Configuration`] and call
//! [`acquire`](cache::ConnectionCache::acquire) from as many tasks as needed. Fresh handles
//! come back without I/O; when the handle is absent or stale exactly one caller selects a
//! [`auth::CredentialStrategy`], probes it with the [`probe::Prober`], and publishes the
//! [`session::SessionHandle`] every waiter then receives.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod probe;
pub mod session;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::RwLock as AsyncRwLock;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
pub use {
	auth::{CredentialStrategy, TokenSecret},
	cache::{CachePolicy, CacheState, ConnectionCache},
	config::{ClientCredentials, Configuration, CredentialKind},
	error::{Error, Result},
	probe::{Backoff, RetryPolicy},
	session::SessionHandle,
};
#[cfg(test)] use {color_eyre as _, httpmock as _};
