//! Command line flags, mapped onto configuration keys.
//!
//! The flags follow the OpenLDAP client tools, so `autoldap -x -D <dn> -W
//! -ZZ` means the same as it does for `ldapsearch`.
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use ldap3::Scope;

use crate::{
	config::{AuthMode, ConfigKey, StartTls},
	search::{DEFAULT_FILTER, DEFAULT_PAGE_SIZE},
};

/// Search scope as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
	/// The base entry only
	Base,
	/// Entries directly below the base
	One,
	/// The base and everything below it
	Sub,
}

impl From<ScopeArg> for Scope {
	fn from(scope: ScopeArg) -> Self {
		match scope {
			ScopeArg::Base => Scope::Base,
			ScopeArg::One => Scope::OneLevel,
			ScopeArg::Sub => Scope::Subtree,
		}
	}
}

/// Search an LDAP directory using layered configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "autoldap", version)]
pub struct Args {
	/// LDAP URI
	#[arg(short = 'H', value_name = "URI")]
	pub uri: Option<String>,
	/// Bind DN
	#[arg(short = 'D', value_name = "binddn")]
	pub bind_dn: Option<String>,
	/// Bind password (for simple authentication)
	#[arg(short = 'w', value_name = "passwd")]
	pub password: Option<String>,
	/// Prompt for the bind password
	#[arg(short = 'W')]
	pub prompt: bool,
	/// SASL mechanism
	#[arg(short = 'Y', value_name = "mech")]
	pub mechanism: Option<String>,
	/// Simple authentication
	#[arg(short = 'x')]
	pub simple: bool,
	/// Try StartTLS, give twice (-ZZ) to demand it
	#[arg(short = 'Z', action = ArgAction::Count)]
	pub starttls: u8,
	/// Search base
	#[arg(short = 'b', value_name = "basedn")]
	pub base_dn: Option<String>,
	/// Additional configuration file, overriding the standard ones
	#[arg(short = 'c', long = "config", value_name = "path")]
	pub config: Option<PathBuf>,
	/// Search scope
	#[arg(short = 's', value_enum, default_value_t = ScopeArg::Sub)]
	pub scope: ScopeArg,
	/// Entries per page
	#[arg(short = 'z', long = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
	pub page_size: i32,
	/// Print the effective configuration and exit
	#[arg(long)]
	pub print_config: bool,
	/// Increase log verbosity
	#[arg(short = 'v', action = ArgAction::Count)]
	pub verbose: u8,
	/// Search filter
	#[arg(default_value = DEFAULT_FILTER)]
	pub filter: String,
	/// Attributes to return
	pub attrs: Vec<String>,
}

impl Args {
	/// The configuration overrides given on the command line, keyed by
	/// configuration key name. Flags that were not given are left out.
	#[must_use]
	pub fn overrides(&self) -> Vec<(&'static str, String)> {
		let mut overrides = Vec::new();
		let mut push = |key: ConfigKey, value: String| overrides.push((key.name(), value));

		if let Some(uri) = &self.uri {
			push(ConfigKey::Uri, uri.clone());
		}
		if let Some(dn) = &self.bind_dn {
			push(ConfigKey::BindDn, dn.clone());
		}
		if let Some(password) = &self.password {
			push(ConfigKey::Password, password.clone());
		}
		if self.prompt {
			push(ConfigKey::Prompt, true.to_string());
		}
		if let Some(mechanism) = &self.mechanism {
			push(ConfigKey::Mechanism, mechanism.clone());
		}
		if self.simple {
			push(ConfigKey::Auth, auth_name(AuthMode::Simple).to_owned());
		}
		match self.starttls {
			0 => {}
			1 => push(ConfigKey::StartTls, StartTls::Try.as_str().to_owned()),
			_ => push(ConfigKey::StartTls, StartTls::Demand.as_str().to_owned()),
		}
		if let Some(base) = &self.base_dn {
			push(ConfigKey::BaseDn, base.clone());
		}
		overrides
	}
}

/// Configuration value selecting an authentication mode
const fn auth_name(mode: AuthMode) -> &'static str {
	match mode {
		AuthMode::Sasl => "sasl",
		AuthMode::Simple => "simple",
		AuthMode::Anonymous => "anonymous",
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use clap::Parser;

	use super::{Args, ScopeArg};
	use crate::config::{Config, StartTls};

	fn parse(args: &[&str]) -> Args {
		Args::try_parse_from(std::iter::once("autoldap").chain(args.iter().copied())).unwrap()
	}

	#[test]
	fn no_flags_no_overrides() {
		let args = parse(&[]);
		assert!(args.overrides().is_empty());
		assert_eq!(args.filter, "(objectClass=*)");
		assert_eq!(args.scope, ScopeArg::Sub);
		assert_eq!(args.page_size, 1000);
	}

	#[test]
	fn flags_map_onto_keys() {
		let args = parse(&[
			"-H",
			"ldap://localhost:1389",
			"-x",
			"-D",
			"cn=admin,dc=example,dc=org",
			"-W",
			"-ZZ",
			"-b",
			"dc=example,dc=org",
			"-s",
			"one",
			"(uid=foo)",
			"cn",
			"mail",
		]);
		let mut config = Config::default();
		assert_eq!(config.apply_overrides(args.overrides()), 6);

		assert_eq!(config.uri, "ldap://localhost:1389");
		assert_eq!(config.auth, "simple");
		assert_eq!(config.bind_dn.as_deref(), Some("cn=admin,dc=example,dc=org"));
		assert!(config.prompt);
		assert_eq!(config.starttls, StartTls::Demand);
		assert_eq!(config.base_dn.as_deref(), Some("dc=example,dc=org"));
		assert_eq!(args.scope, ScopeArg::One);
		assert_eq!(args.filter, "(uid=foo)");
		assert_eq!(args.attrs, ["cn", "mail"]);
	}

	#[test]
	fn single_z_tries_starttls() {
		let mut config = Config::default();
		config.set("starttls", "none");
		config.apply_overrides(parse(&["-Z"]).overrides());
		assert_eq!(config.starttls, StartTls::Try);
	}
}
