//! Session handles and the factory that builds them from a probed credential strategy.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{CredentialStrategy, TokenSecret},
	config::{self, Configuration, CredentialKind},
	probe::ProbeReport,
};

/// Identifier assigned to each session built by a [`SessionFactory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);
impl SessionId {
	/// Raw numeric value.
	pub const fn get(self) -> u64 {
		self.0
	}
}
impl Display for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "session-{}", self.0)
	}
}

struct Session {
	id: SessionId,
	base_address: Url,
	credentials: Arc<dyn CredentialStrategy>,
	initial_token: TokenSecret,
	probe_attempts: u32,
	created_at: OffsetDateTime,
}

/// Immutable, shareable reference to an authenticated session.
///
/// Cloning is cheap and every clone refers to the same session. Equality is identity:
/// two handles compare equal only when they were produced by the same refresh.
#[derive(Clone)]
pub struct SessionHandle(Arc<Session>);
impl SessionHandle {
	/// Identifier assigned when the session was built.
	pub fn id(&self) -> SessionId {
		self.0.id
	}

	/// Base address the session is bound to (always ends with `/`).
	pub fn base_address(&self) -> &Url {
		&self.0.base_address
	}

	/// Instant the session was published.
	pub fn created_at(&self) -> OffsetDateTime {
		self.0.created_at
	}

	/// Which credential kind authenticated the session.
	pub fn credential_kind(&self) -> CredentialKind {
		self.0.credentials.kind()
	}

	/// Token obtained while probing the credentials.
	pub fn initial_token(&self) -> &TokenSecret {
		&self.0.initial_token
	}

	/// Attempts the prober needed before the session was built.
	pub fn probe_attempts(&self) -> u32 {
		self.0.probe_attempts
	}

	/// Current access token from the underlying credential strategy.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		self.0.credentials.access_token().await
	}

	/// Resolves a request path against the base address.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		Ok(config::join_endpoint(&self.0.base_address, path)?)
	}

	/// Returns `true` when both handles refer to the same session.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}
impl PartialEq for SessionHandle {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}
impl Eq for SessionHandle {}
impl Debug for SessionHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionHandle")
			.field("id", &self.0.id)
			.field("base_address", &self.0.base_address.as_str())
			.field("credential_kind", &self.credential_kind())
			.field("created_at", &self.0.created_at)
			.finish_non_exhaustive()
	}
}

/// Builds session handles; performs no I/O.
#[derive(Debug, Default)]
pub struct SessionFactory {
	next_id: AtomicU64,
}
impl SessionFactory {
	/// Binds a probed strategy and the configuration's base address into a new handle.
	pub fn build(
		&self,
		config: &Configuration,
		credentials: Arc<dyn CredentialStrategy>,
		report: ProbeReport,
		created_at: OffsetDateTime,
	) -> Result<SessionHandle> {
		let base_address = config.base_url()?;
		let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

		Ok(SessionHandle(Arc::new(Session {
			id,
			base_address,
			credentials,
			initial_token: report.token,
			probe_attempts: report.attempts,
			created_at,
		})))
	}
}
