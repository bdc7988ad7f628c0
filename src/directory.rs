//! The directory client capability a [`Session`](crate::Session) is built on.
//!
//! [`Connector`] and [`Connection`] describe the handful of operations the
//! session needs: connecting (optionally with StartTLS), binding, searching
//! with an optional paging cookie and unbinding. [`LdapConnector`] provides
//! them on top of the synchronous [`ldap3::LdapConn`].
use std::{fmt, sync::Arc, time::Duration};

use ldap3::{
	controls::{Control, ControlType, MakeCritical, PagedResults},
	LdapConn, LdapConnSettings, LdapError, LdapResult, SearchEntry, SearchOptions, SearchResult,
};
use tracing::debug;
use url::Url;

use crate::{
	config::Mechanism,
	search::{PageRequest, SearchPage, SearchRequest},
};

/// LDAP result code `sizeLimitExceeded`
pub const SIZE_LIMIT_EXCEEDED: u32 = 4;
/// LDAP result code `authMethodNotSupported`
pub const AUTH_METHOD_NOT_SUPPORTED: u32 = 7;
/// LDAP result code `noSuchObject`
pub const NO_SUCH_OBJECT: u32 = 32;

/// Opens connections to a directory server.
pub trait Connector {
	/// The connection type produced
	type Connection: Connection;

	/// Connects to `uri`. When `options.starttls` is set the connection is
	/// upgraded with StartTLS before it is returned, and a failed upgrade is
	/// a failed connect.
	fn connect(&self, uri: &Url, options: &ConnectOptions) -> Result<Self::Connection, LdapError>;
}

/// A live connection to a directory server.
pub trait Connection {
	/// Simple bind. An empty DN and password bind anonymously.
	fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError>;

	/// SASL bind with the given mechanism. `host` is the server's host name,
	/// needed by Kerberos.
	fn sasl_bind(&mut self, mechanism: &Mechanism, host: &str) -> Result<(), LdapError>;

	/// Performs a search. With `page` set the request carries the simple
	/// paged results control, and the returned page holds the server's
	/// continuation cookie.
	fn search(
		&mut self,
		request: &SearchRequest,
		page: Option<&PageRequest>,
	) -> Result<SearchPage, LdapError>;

	/// Ends the session with the server.
	fn unbind(&mut self) -> Result<(), LdapError>;
}

/// How to establish a connection
#[derive(Clone, Default)]
pub struct ConnectOptions {
	/// Upgrade the connection with StartTLS
	pub starttls: bool,
	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,
	/// TLS client configuration to use instead of the library default
	pub tls_config: Option<Arc<rustls::ClientConfig>>,
	/// Timeout for establishing the connection
	pub timeout: Option<Duration>,
}

impl fmt::Debug for ConnectOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectOptions")
			.field("starttls", &self.starttls)
			.field("no_tls_verify", &self.no_tls_verify)
			.field("tls_config", &self.tls_config.as_ref().map(|_| "custom"))
			.field("timeout", &self.timeout)
			.finish()
	}
}

impl ConnectOptions {
	/// Create a [`LdapConnSettings`] based on these options
	pub(crate) fn to_settings(&self) -> LdapConnSettings {
		let mut settings = LdapConnSettings::new()
			.set_starttls(self.starttls)
			.set_no_tls_verify(self.no_tls_verify);
		if let Some(timeout) = self.timeout {
			settings = settings.set_conn_timeout(timeout);
		}
		if let Some(config) = &self.tls_config {
			settings = settings.set_config(Arc::clone(config));
		}
		settings
	}
}

/// [`Connector`] backed by `ldap3`'s synchronous client.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

impl Connector for LdapConnector {
	type Connection = LdapConnection;

	fn connect(&self, uri: &Url, options: &ConnectOptions) -> Result<LdapConnection, LdapError> {
		debug!("Connecting to {uri} with {options:?}");
		let inner = LdapConn::from_url_with_settings(options.to_settings(), uri)?;
		Ok(LdapConnection { inner })
	}
}

/// A connection opened by [`LdapConnector`].
pub struct LdapConnection {
	/// The underlying client
	inner: LdapConn,
}

impl fmt::Debug for LdapConnection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LdapConnection").finish_non_exhaustive()
	}
}

impl LdapConnection {
	/// Direct access to the `ldap3` client, for operations this crate does
	/// not wrap.
	pub fn client(&mut self) -> &mut LdapConn {
		&mut self.inner
	}
}

impl Connection for LdapConnection {
	fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError> {
		self.inner.simple_bind(dn, password)?.success()?;
		Ok(())
	}

	fn sasl_bind(&mut self, mechanism: &Mechanism, host: &str) -> Result<(), LdapError> {
		match mechanism {
			Mechanism::External => {
				self.inner.sasl_external_bind()?.success()?;
			}
			#[cfg(feature = "gssapi")]
			Mechanism::Gssapi => {
				self.inner.sasl_gssapi_bind(host)?.success()?;
			}
			#[cfg(not(feature = "gssapi"))]
			Mechanism::Gssapi => {
				debug!("GSSAPI bind to {host} requested without the gssapi feature");
				return Err(unsupported_mechanism(mechanism));
			}
			Mechanism::Other(_) => return Err(unsupported_mechanism(mechanism)),
		}
		Ok(())
	}

	fn search(
		&mut self,
		request: &SearchRequest,
		page: Option<&PageRequest>,
	) -> Result<SearchPage, LdapError> {
		if let Some(limit) = request.size_limit {
			self.inner.with_search_options(SearchOptions::new().sizelimit(limit));
		}
		if let Some(page) = page {
			let control = PagedResults { size: page.size, cookie: page.cookie.clone() };
			if page.critical {
				self.inner.with_controls(control.critical());
			} else {
				self.inner.with_controls(control);
			}
		}

		let SearchResult(entries, result) = self.inner.search(
			&request.base,
			request.scope,
			&request.filter,
			request.attrs.clone(),
		)?;
		// A size limit is a request to truncate, not a failure
		let result = match result.rc {
			SIZE_LIMIT_EXCEEDED if request.size_limit.is_some() => result,
			_ => result.success()?,
		};

		Ok(SearchPage {
			entries: entries.into_iter().map(SearchEntry::construct).collect(),
			cookie: paging_cookie(&result),
		})
	}

	fn unbind(&mut self) -> Result<(), LdapError> {
		self.inner.unbind()
	}
}

/// The cookie of the paged results control in a search result, empty if the
/// server sent none.
fn paging_cookie(result: &LdapResult) -> Vec<u8> {
	result
		.ctrls
		.iter()
		.find_map(|Control(kind, raw)| match kind {
			Some(ControlType::PagedResults) => Some(raw.parse::<PagedResults>().cookie),
			_ => None,
		})
		.unwrap_or_default()
}

/// The error reported for SASL mechanisms the client cannot perform
fn unsupported_mechanism(mechanism: &Mechanism) -> LdapError {
	LdapError::LdapResult {
		result: LdapResult {
			rc: AUTH_METHOD_NOT_SUPPORTED,
			matched: String::new(),
			text: format!("SASL mechanism {} is not supported", mechanism.as_str()),
			refs: Vec::new(),
			ctrls: Vec::new(),
		},
	}
}
