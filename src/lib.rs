//! Connect and authenticate to an LDAP directory server with layered
//! configuration.
//!
//! The library resolves connection and authentication settings from a set of
//! configuration files (system wide, per user, per directory and an optional
//! explicit one) plus programmatic overrides, opens a connection with the
//! requested StartTLS policy and binds anonymously, with a simple bind
//! (optionally prompting for the password) or with SASL `EXTERNAL` or
//! `GSSAPI`. The directory protocol itself is handled by the [`ldap3`] crate.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate is
//! an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use autoldap::{Config, Scope, SearchEntryExt, Session};
//!
//! // Reads /etc/autoldap/autoldap.conf, ~/.autoldaprc and ./autoldap.conf
//! let mut config = Config::load(None)?;
//! config.apply_overrides([("auth", "simple"), ("binddn", "cn=admin,dc=example,dc=org")]);
//! config.set("prompt", "yes");
//!
//! let mut session = Session::open(config)?;
//! for page in session.paged_search(None, Scope::Subtree, 500, "(objectClass=person)", &["cn"])? {
//!     for entry in page? {
//!         println!("{}: {:?}", entry.dn, entry.attr_first("cn"));
//!     }
//! }
//! session.unbind()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Sessions are synchronous; every operation blocks until the server
//!   answers.
//! * Only protocol version 3 is spoken, whatever `version` says.
//! * SASL mechanisms other than `EXTERNAL` and `GSSAPI` are refused by the
//!   `ldap3` connector. `GSSAPI` needs the `gssapi` feature.

pub mod cli;
pub mod config;
pub mod directory;
pub mod entry;
pub mod error;
pub mod prompt;
pub mod search;
pub mod session;

pub use ldap3::{self, Scope, SearchEntry};

pub use crate::{
	config::{AuthMode, Config, ConfigKey, ConfigSources, Mechanism, StartTls, TlsConfig, Value},
	directory::{Connection, Connector, LdapConnector},
	entry::{unpack_one, SearchEntryExt},
	error::Error,
	prompt::{PasswordPrompt, TerminalPrompt},
	search::{PagedSearch, SearchPage, SearchRequest},
	session::Session,
};
