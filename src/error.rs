//! Error codes
use std::path::PathBuf;

use ldap3::LdapError;

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// A configuration file exists but could not be read or parsed.
	#[error("Configuration file {path} is unreadable: {source}")]
	ConfigUnreadable {
		/// The offending file
		path: PathBuf,
		/// Why reading it failed
		source: ConfigFileError,
	},
	/// The connection to the directory server could not be established.
	#[error("Could not connect to the directory server: {0}")]
	Connection(#[source] LdapError),
	/// The configured URI is not a valid URL.
	#[error("Invalid directory URI {uri:?}: {source}")]
	InvalidUri {
		/// The configured URI
		uri: String,
		/// Why it failed to parse
		source: url::ParseError,
	},
	/// StartTLS was demanded but could not be negotiated.
	#[error("StartTLS was demanded but failed: {0}")]
	EncryptionRequired(#[source] LdapError),
	/// A simple bind was requested without a bind DN or password.
	#[error("Invalid credentials: simple bind needs a bind DN and a password")]
	InvalidCredentials,
	/// The configured authentication mode is none of sasl, simple or anonymous.
	#[error("Unknown authentication mode {0:?}")]
	UnknownAuthMode(String),
	/// The TLS configuration could not be turned into a client configuration.
	#[error("Invalid TLS configuration: {0}")]
	Tls(String),
	/// An operation needing a bound session was called on an unbound one.
	#[error("The session is not bound")]
	NotBound,
	/// Reading from the terminal or a file failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The directory server or the LDAP library reported an error.
	#[error(transparent)]
	Directory(#[from] LdapError),
}

/// Reasons a single configuration file can fail to load.
#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
	/// The file could not be read.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The file is not a valid INI file.
	#[error(transparent)]
	Parse(#[from] ini::ParseError),
}

impl Error {
	/// The LDAP result code carried by this error, if the server sent one.
	#[must_use]
	pub fn result_code(&self) -> Option<u32> {
		match self {
			Error::Directory(LdapError::LdapResult { result })
			| Error::Connection(LdapError::LdapResult { result })
			| Error::EncryptionRequired(LdapError::LdapResult { result }) => Some(result.rc),
			_ => None,
		}
	}
}
