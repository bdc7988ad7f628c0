//! Establishing an authenticated session and querying through it.
use ldap3::{LdapError, Scope, SearchEntry};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
	config::{AuthMode, Config, Mechanism, StartTls, DEFAULT_VERSION},
	directory::{Connection, Connector, LdapConnector, NO_SUCH_OBJECT},
	error::Error,
	prompt::{PasswordPrompt, TerminalPrompt, PASSWORD_PROMPT},
	search::{PagedSearch, SearchRequest},
};

/// What to authenticate with, resolved from the configuration before any
/// network traffic happens.
#[derive(Clone, PartialEq, Eq)]
enum Credentials {
	/// Anonymous simple bind
	Anonymous,
	/// Simple bind
	Simple {
		/// Bind DN
		dn: String,
		/// Bind password
		password: String,
	},
	/// SASL bind
	Sasl(Mechanism),
}

/// A session with a directory server.
///
/// The session owns its [`Config`], a [`Connector`] used to open
/// connections, a [`PasswordPrompt`] for interactive simple binds, and at
/// most one live connection. Binding walks a fixed sequence: connect, apply
/// the StartTLS policy, authenticate. Nothing is retried.
pub struct Session<C: Connector = LdapConnector, P = TerminalPrompt> {
	/// Effective configuration
	config: Config,
	/// Opens connections
	connector: C,
	/// Asks for missing passwords
	prompt: P,
	/// The live connection, once bound
	connection: Option<C::Connection>,
}

impl<C: Connector, P> std::fmt::Debug for Session<C, P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("config", &self.config)
			.field("bound", &self.connection.is_some())
			.finish_non_exhaustive()
	}
}

impl Session {
	/// Create an unbound session using `ldap3` and the terminal.
	#[must_use]
	pub fn new(config: Config) -> Self {
		Self::with_connector(config, LdapConnector)
	}

	/// Create a session and bind it right away.
	pub fn open(config: Config) -> Result<Self, Error> {
		let mut session = Self::new(config);
		session.bind()?;
		Ok(session)
	}
}

impl<C: Connector> Session<C> {
	/// Create an unbound session using the given connector.
	pub fn with_connector(config: Config, connector: C) -> Self {
		Self { config, connector, prompt: TerminalPrompt, connection: None }
	}
}

impl<C: Connector, P: PasswordPrompt> Session<C, P> {
	/// Replace the password prompt. Any live connection is kept.
	pub fn with_prompt<Q: PasswordPrompt>(self, prompt: Q) -> Session<C, Q> {
		Session { config: self.config, connector: self.connector, prompt, connection: self.connection }
	}

	/// The effective configuration
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Sets a configuration key, matched case-insensitively. Takes effect on
	/// the next [`bind`](Self::bind). Returns whether the key was recognized.
	pub fn set(&mut self, key: &str, value: &str) -> bool {
		self.config.set(key, value)
	}

	/// Whether the session holds a live, authenticated connection
	pub fn is_bound(&self) -> bool {
		self.connection.is_some()
	}

	/// Connects and authenticates according to the configuration. A live
	/// connection is dropped first.
	pub fn bind(&mut self) -> Result<(), Error> {
		self.close();

		let credentials = self.credentials()?;
		let uri = Url::parse(&self.config.uri)
			.map_err(|source| Error::InvalidUri { uri: self.config.uri.clone(), source })?;
		if self.config.version != DEFAULT_VERSION {
			warn!("Protocol version {} requested, only version 3 is supported", self.config.version);
		}

		let mut connection = self.connect(&uri)?;
		authenticate(&mut connection, &credentials, uri.host_str().unwrap_or_default())?;
		info!("Bound to {uri} using {credentials:?}");
		self.connection = Some(connection);
		Ok(())
	}

	/// Unbinds and replays the whole bind sequence from scratch.
	pub fn rebind(&mut self) -> Result<(), Error> {
		if let Err(err) = self.unbind() {
			warn!("Unbind before rebind failed: {err}");
		}
		self.bind()
	}

	/// Ends the session with the server. Does nothing if unbound.
	pub fn unbind(&mut self) -> Result<(), Error> {
		match self.connection.take() {
			Some(mut connection) => Ok(connection.unbind()?),
			None => Ok(()),
		}
	}

	/// Drops a live connection, logging unbind failures.
	fn close(&mut self) {
		if let Err(err) = self.unbind() {
			debug!("Dropping connection after failed unbind: {err}");
		}
	}

	/// The live connection, for operations not covered here.
	pub fn connection(&mut self) -> Result<&mut C::Connection, Error> {
		self.connection.as_mut().ok_or(Error::NotBound)
	}

	/// Works out how to authenticate, prompting for a password if allowed.
	fn credentials(&mut self) -> Result<Credentials, Error> {
		let credentials = match self.config.auth_mode()? {
			AuthMode::Sasl => Credentials::Sasl(self.config.mechanism.clone()),
			AuthMode::Anonymous => Credentials::Anonymous,
			AuthMode::Simple => {
				let dn = self.config.bind_dn.clone().filter(|dn| !dn.is_empty());
				let configured = self.config.password.clone().filter(|password| !password.is_empty());
				let password = match (&dn, configured) {
					(_, Some(password)) => Some(password),
					(Some(_), None) if self.config.prompt => {
						Some(self.prompt.prompt_password(PASSWORD_PROMPT)?)
					}
					_ => None,
				};
				match (dn, password.filter(|password| !password.is_empty())) {
					(Some(dn), Some(password)) => Credentials::Simple { dn, password },
					_ => return Err(Error::InvalidCredentials),
				}
			}
		};
		Ok(credentials)
	}

	/// Opens a connection, applying the StartTLS policy.
	fn connect(&self, uri: &Url) -> Result<C::Connection, Error> {
		match self.config.starttls {
			StartTls::None => self
				.connector
				.connect(uri, &self.config.connect_options(false)?)
				.map_err(Error::Connection),
			StartTls::Try => match self.connector.connect(uri, &self.config.connect_options(true)?) {
				Ok(connection) => Ok(connection),
				Err(err) => {
					warn!("StartTLS with {uri} failed, continuing unencrypted: {err}");
					self.connector
						.connect(uri, &self.config.connect_options(false)?)
						.map_err(Error::Connection)
				}
			},
			StartTls::Demand => match self.connector.connect(uri, &self.config.connect_options(true)?) {
				Ok(connection) => Ok(connection),
				Err(err) => Err(self.starttls_failure(uri, err)),
			},
		}
	}

	/// Classifies a failed StartTLS connect. A server that can't be reached
	/// without StartTLS either is a connection error, anything else means the
	/// upgrade itself failed.
	fn starttls_failure(&self, uri: &Url, err: LdapError) -> Error {
		let plain = match self.config.connect_options(false) {
			Ok(options) => self.connector.connect(uri, &options),
			Err(err) => return err,
		};
		match plain {
			Ok(mut connection) => {
				if let Err(unbind_err) = connection.unbind() {
					debug!("Unbinding from {uri} failed: {unbind_err}");
				}
				Error::EncryptionRequired(err)
			}
			Err(plain_err) => {
				debug!("StartTLS with {uri} failed: {err}");
				Error::Connection(plain_err)
			}
		}
	}

	/// Fetches the entry at `base`. `Ok(None)` if it doesn't exist or doesn't
	/// match `filter`.
	pub fn fetch_entry(
		&mut self,
		base: &str,
		filter: &str,
		attrs: &[&str],
	) -> Result<Option<SearchEntry>, Error> {
		let request = SearchRequest::new(base, Scope::Base, filter, attrs).with_size_limit(1);
		match self.connection()?.search(&request, None) {
			Ok(page) => Ok(page.entries.into_iter().next()),
			Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	/// Searches below `base`, or below the configured `basedn` when `base`
	/// is `None`. Returns no entries if neither is set.
	pub fn search(
		&mut self,
		base: Option<&str>,
		scope: Scope,
		filter: &str,
		attrs: &[&str],
	) -> Result<Vec<SearchEntry>, Error> {
		let Some(request) = self.request(base, scope, filter, attrs) else {
			return Ok(Vec::new());
		};
		Ok(self.connection()?.search(&request, None)?.entries)
	}

	/// Searches page by page using the simple paged results control. The
	/// base falls back to the configured `basedn`; without either the
	/// returned iterator is empty.
	pub fn paged_search(
		&mut self,
		base: Option<&str>,
		scope: Scope,
		page_size: i32,
		filter: &str,
		attrs: &[&str],
	) -> Result<PagedSearch<'_, C::Connection>, Error> {
		let request = self.request(base, scope, filter, attrs);
		let connection = self.connection()?;
		Ok(match request {
			Some(request) => PagedSearch::new(connection, request, page_size),
			None => PagedSearch::empty(SearchRequest::new("", scope, filter, attrs)),
		})
	}

	/// Builds a request against `base` or the default base.
	fn request(
		&self,
		base: Option<&str>,
		scope: Scope,
		filter: &str,
		attrs: &[&str],
	) -> Option<SearchRequest> {
		let Some(base) = base.or(self.config.base_dn.as_deref()) else {
			debug!("No search base given or configured, nothing to search");
			return None;
		};
		Some(SearchRequest::new(base, scope, filter, attrs))
	}
}

/// Binds `connection` with `credentials`.
fn authenticate<C: Connection>(
	connection: &mut C,
	credentials: &Credentials,
	host: &str,
) -> Result<(), Error> {
	match credentials {
		Credentials::Anonymous => connection.simple_bind("", "")?,
		Credentials::Simple { dn, password } => connection.simple_bind(dn, password)?,
		Credentials::Sasl(mechanism) => connection.sasl_bind(mechanism, host)?,
	}
	Ok(())
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Credentials::Anonymous => f.write_str("anonymous bind"),
			Credentials::Simple { dn, .. } => write!(f, "simple bind as {dn}"),
			Credentials::Sasl(mechanism) => write!(f, "SASL {}", mechanism.as_str()),
		}
	}
}
