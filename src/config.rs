//! Layered configuration for the LDAP client.
//!
//! The effective [`Config`] starts from built-in defaults and is then
//! overlaid, in order, by the system wide file, the file in the user's home
//! directory, the file in the current working directory, an optional
//! caller-supplied file and finally programmatic overrides. For every key the
//! last source that defines it wins.
//!
//! Files are INI with a single recognized section. Values are taken as
//! written, without quoting:
//!
//! ```ini
//! [AutoLDAP]
//! URI = ldap://ldap.example.com
//! binddn = cn=admin,dc=example,dc=com
//! prompt = yes
//! auth = simple
//! starttls = demand
//! basedn = dc=example,dc=com
//! ```
use std::{
	fmt,
	fs::File,
	io::{BufReader, ErrorKind},
	path::{Path, PathBuf},
	str::FromStr,
	sync::Arc,
	time::Duration,
};

use ini::{Ini, ParseOption};
use tracing::{debug, warn};

use crate::{
	directory::ConnectOptions,
	error::{ConfigFileError, Error},
};

/// Name of the table read from configuration files
pub const SECTION: &str = "AutoLDAP";
/// URI used when none is configured
pub const DEFAULT_URI: &str = "ldapi:///";
/// LDAP protocol version used when none is configured
pub const DEFAULT_VERSION: u32 = 3;
/// System wide configuration file
pub const SYSTEM_CONFIG: &str = "/etc/autoldap/autoldap.conf";
/// Configuration file in the user's home directory
pub const HOME_CONFIG: &str = ".autoldaprc";
/// Configuration file in the current working directory
pub const LOCAL_CONFIG: &str = "autoldap.conf";

/// The closed set of recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
	/// Server URI, `ldap://`, `ldaps://` or `ldapi://`
	Uri,
	/// DN used for simple binds
	BindDn,
	/// Password used for simple binds
	Password,
	/// Whether to prompt for a missing simple bind password
	Prompt,
	/// SASL mechanism
	Mechanism,
	/// StartTLS policy
	StartTls,
	/// Authentication mode
	Auth,
	/// Default search base
	BaseDn,
	/// Protocol version
	Version,
	/// PEM file with the CA certificates to trust
	TlsCaCert,
	/// Disable verification of the server certificate
	TlsNoVerify,
	/// Connection timeout in seconds
	Timeout,
}

impl ConfigKey {
	/// Every key, in the order they are documented
	pub const ALL: [ConfigKey; 12] = [
		ConfigKey::Uri,
		ConfigKey::BindDn,
		ConfigKey::Password,
		ConfigKey::Prompt,
		ConfigKey::Mechanism,
		ConfigKey::StartTls,
		ConfigKey::Auth,
		ConfigKey::BaseDn,
		ConfigKey::Version,
		ConfigKey::TlsCaCert,
		ConfigKey::TlsNoVerify,
		ConfigKey::Timeout,
	];

	/// The name of the key as it appears in configuration files.
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			ConfigKey::Uri => "URI",
			ConfigKey::BindDn => "binddn",
			ConfigKey::Password => "passwd",
			ConfigKey::Prompt => "prompt",
			ConfigKey::Mechanism => "saslmech",
			ConfigKey::StartTls => "starttls",
			ConfigKey::Auth => "auth",
			ConfigKey::BaseDn => "basedn",
			ConfigKey::Version => "version",
			ConfigKey::TlsCaCert => "tls_cacert",
			ConfigKey::TlsNoVerify => "tls_noverify",
			ConfigKey::Timeout => "timeout",
		}
	}

	/// Exact, case-sensitive lookup as used for configuration files.
	fn from_file_key(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|key| key.name() == name)
	}
}

impl fmt::Display for ConfigKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Returned when parsing a name that is not a [`ConfigKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown configuration key {0:?}")]
pub struct UnknownKey(pub String);

impl FromStr for ConfigKey {
	type Err = UnknownKey;

	/// Case-insensitive lookup, as used for overrides.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|key| key.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownKey(s.to_owned()))
	}
}

/// SASL mechanism to bind with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mechanism {
	/// Identity established outside of LDAP, e.g. a TLS client certificate
	/// or the peer credentials of an `ldapi://` socket
	#[default]
	External,
	/// Kerberos
	Gssapi,
	/// Anything else; left to the connector to accept or refuse
	Other(String),
}

impl Mechanism {
	/// Maps a configured value onto a mechanism. Matching is by
	/// case-insensitive substring, `EXTERNAL` first, and never fails.
	#[must_use]
	pub fn parse(value: &str) -> Self {
		let upper = value.to_ascii_uppercase();
		if upper.contains("EXTERNAL") {
			Mechanism::External
		} else if upper.contains("GSSAPI") {
			Mechanism::Gssapi
		} else {
			Mechanism::Other(value.to_owned())
		}
	}

	/// The mechanism name
	#[must_use]
	pub fn as_str(&self) -> &str {
		match self {
			Mechanism::External => "EXTERNAL",
			Mechanism::Gssapi => "GSSAPI",
			Mechanism::Other(name) => name,
		}
	}
}

/// Whether and how to upgrade the connection with StartTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartTls {
	/// Never attempt StartTLS
	None,
	/// Attempt StartTLS, continue in the clear if it fails
	#[default]
	Try,
	/// Attempt StartTLS, abort if it fails
	Demand,
}

impl StartTls {
	/// Case-insensitive parse. Unrecognized values fall back to
	/// [`StartTls::None`].
	#[must_use]
	pub fn parse(value: &str) -> Self {
		let lower = value.to_ascii_lowercase();
		if lower.contains("demand") {
			StartTls::Demand
		} else if lower.contains("try") {
			StartTls::Try
		} else {
			if lower != "none" {
				warn!("Unrecognized starttls value {value:?}, not using StartTLS");
			}
			StartTls::None
		}
	}

	/// The canonical configuration value
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			StartTls::None => "none",
			StartTls::Try => "try",
			StartTls::Demand => "demand",
		}
	}
}

/// How to authenticate once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
	/// SASL bind with the configured [`Mechanism`]
	Sasl,
	/// Simple bind with DN and password
	Simple,
	/// Anonymous simple bind
	Anonymous,
}

impl AuthMode {
	/// Case-insensitive substring match, checked in the order `sasl`,
	/// `simple`, `anon`.
	pub fn parse(value: &str) -> Result<Self, Error> {
		let lower = value.to_ascii_lowercase();
		if lower.contains("sasl") {
			Ok(AuthMode::Sasl)
		} else if lower.contains("simple") {
			Ok(AuthMode::Simple)
		} else if lower.contains("anon") {
			Ok(AuthMode::Anonymous)
		} else {
			Err(Error::UnknownAuthMode(value.to_owned()))
		}
	}
}

/// TLS settings used for StartTLS and `ldaps://`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
	/// PEM file with the root certificates to trust instead of the
	/// library's defaults
	pub ca_certificate: Option<PathBuf>,
	/// Disable verification of TLS certificates
	pub no_verify: bool,
}

impl TlsConfig {
	/// Builds a rustls client configuration trusting the configured CA
	/// certificates, or `None` when no CA file is configured.
	pub fn client_config(&self) -> Result<Option<Arc<rustls::ClientConfig>>, Error> {
		let Some(path) = &self.ca_certificate else {
			return Ok(None);
		};
		let mut reader = BufReader::new(File::open(path)?);
		let certs = rustls_pemfile::certs(&mut reader)?;
		if certs.is_empty() {
			return Err(Error::Tls(format!("No certificates found in {}", path.display())));
		}
		let mut roots = rustls::RootCertStore::empty();
		for cert in certs {
			roots
				.add(&rustls::Certificate(cert))
				.map_err(|err| Error::Tls(format!("{}: {err}", path.display())))?;
		}
		let config = rustls::ClientConfig::builder()
			.with_safe_defaults()
			.with_root_certificates(roots)
			.with_no_client_auth();
		Ok(Some(Arc::new(config)))
	}
}

/// The effective configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
	/// Server URI
	pub uri: String,
	/// DN for simple binds
	pub bind_dn: Option<String>,
	/// Password for simple binds
	pub password: Option<String>,
	/// Prompt on the terminal when a simple bind has no password
	pub prompt: bool,
	/// SASL mechanism
	pub mechanism: Mechanism,
	/// StartTLS policy
	pub starttls: StartTls,
	/// Authentication mode, validated by [`Config::auth_mode`] when binding
	pub auth: String,
	/// Default search base
	pub base_dn: Option<String>,
	/// Protocol version
	pub version: u32,
	/// Connection timeout, library default when unset
	pub timeout: Option<Duration>,
	/// TLS settings
	pub tls: TlsConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			uri: DEFAULT_URI.to_owned(),
			bind_dn: None,
			password: None,
			prompt: false,
			mechanism: Mechanism::External,
			starttls: StartTls::Try,
			auth: "sasl".to_owned(),
			base_dn: None,
			version: DEFAULT_VERSION,
			timeout: None,
			tls: TlsConfig::default(),
		}
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("uri", &self.uri)
			.field("bind_dn", &self.bind_dn)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("prompt", &self.prompt)
			.field("mechanism", &self.mechanism)
			.field("starttls", &self.starttls)
			.field("auth", &self.auth)
			.field("base_dn", &self.base_dn)
			.field("version", &self.version)
			.field("timeout", &self.timeout)
			.field("tls", &self.tls)
			.finish()
	}
}

/// Renders the effective configuration as a configuration file, with the
/// password redacted.
impl fmt::Display for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "[{SECTION}]")?;
		for key in ConfigKey::ALL {
			match (key, self.get(key)) {
				(_, Value::Unset) => writeln!(f, "# {key} is unset")?,
				(ConfigKey::Password, _) => writeln!(f, "{key} = <redacted>")?,
				(_, value) => writeln!(f, "{key} = {value}")?,
			}
		}
		Ok(())
	}
}

/// The value of a single configuration key, as returned by [`Config::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
	/// A string value
	Text(&'a str),
	/// A boolean value
	Flag(bool),
	/// An integer value
	Number(u64),
	/// An optional value that is not set
	Unset,
}

impl fmt::Display for Value<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Text(text) => f.write_str(text),
			Value::Flag(flag) => write!(f, "{flag}"),
			Value::Number(number) => write!(f, "{number}"),
			Value::Unset => Ok(()),
		}
	}
}

impl Config {
	/// Loads the configuration from the standard locations plus an optional
	/// explicit file.
	pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
		Self::load_from(&ConfigSources::standard(explicit))
	}

	/// Loads the configuration from the given files, in increasing order of
	/// precedence. Files that don't exist are skipped.
	pub fn load_from(sources: &ConfigSources) -> Result<Self, Error> {
		let mut config = Config::default();
		for path in sources.paths() {
			let Some(section) = read_section(path)? else {
				continue;
			};
			debug!("Applying configuration from {}", path.display());
			config.apply_section(path, &section);
		}
		Ok(config)
	}

	/// Overlays the recognized keys of one `[AutoLDAP]` section, in file
	/// order.
	fn apply_section(&mut self, path: &Path, section: &[(String, String)]) {
		for (name, value) in section {
			match ConfigKey::from_file_key(name) {
				Some(key) => self.set_key(key, value),
				None => debug!("Ignoring unknown key {name:?} in {}", path.display()),
			}
		}
	}

	/// Sets a single key, matched case-insensitively. Returns whether the key
	/// was recognized.
	pub fn set(&mut self, key: &str, value: &str) -> bool {
		match key.parse::<ConfigKey>() {
			Ok(key) => {
				self.set_key(key, value);
				true
			}
			Err(err) => {
				debug!("{err}, ignoring");
				false
			}
		}
	}

	/// Applies every recognized key of `overrides`, returning how many were
	/// applied.
	pub fn apply_overrides<I, K, V>(&mut self, overrides: I) -> usize
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		overrides.into_iter().filter(|(key, value)| self.set(key.as_ref(), value.as_ref())).count()
	}

	/// Sets a key from its textual value. Booleans and numbers that fail to
	/// parse degrade instead of failing.
	pub fn set_key(&mut self, key: ConfigKey, value: &str) {
		match key {
			ConfigKey::Uri => self.uri = value.to_owned(),
			ConfigKey::BindDn => self.bind_dn = Some(value.to_owned()),
			ConfigKey::Password => self.password = Some(value.to_owned()),
			ConfigKey::Prompt => self.prompt = parse_flag(key, value),
			ConfigKey::Mechanism => self.mechanism = Mechanism::parse(value),
			ConfigKey::StartTls => self.starttls = StartTls::parse(value),
			ConfigKey::Auth => self.auth = value.to_owned(),
			ConfigKey::BaseDn => self.base_dn = Some(value.to_owned()),
			ConfigKey::Version => match value.trim().parse() {
				Ok(version) => self.version = version,
				Err(_) => warn!("Invalid {key} {value:?}, keeping {}", self.version),
			},
			ConfigKey::TlsCaCert => self.tls.ca_certificate = Some(PathBuf::from(value)),
			ConfigKey::TlsNoVerify => self.tls.no_verify = parse_flag(key, value),
			ConfigKey::Timeout => match value.trim().parse() {
				Ok(secs) => self.timeout = Some(Duration::from_secs(secs)),
				Err(_) => warn!("Invalid {key} {value:?}, ignoring"),
			},
		}
	}

	/// Returns the effective value of a key.
	#[must_use]
	pub fn get(&self, key: ConfigKey) -> Value<'_> {
		fn optional(value: Option<&String>) -> Value<'_> {
			value.map_or(Value::Unset, |value| Value::Text(value))
		}

		match key {
			ConfigKey::Uri => Value::Text(&self.uri),
			ConfigKey::BindDn => optional(self.bind_dn.as_ref()),
			ConfigKey::Password => optional(self.password.as_ref()),
			ConfigKey::Prompt => Value::Flag(self.prompt),
			ConfigKey::Mechanism => Value::Text(self.mechanism.as_str()),
			ConfigKey::StartTls => Value::Text(self.starttls.as_str()),
			ConfigKey::Auth => Value::Text(&self.auth),
			ConfigKey::BaseDn => optional(self.base_dn.as_ref()),
			ConfigKey::Version => Value::Number(u64::from(self.version)),
			ConfigKey::TlsCaCert => self
				.tls
				.ca_certificate
				.as_ref()
				.and_then(|path| path.to_str())
				.map_or(Value::Unset, Value::Text),
			ConfigKey::TlsNoVerify => Value::Flag(self.tls.no_verify),
			ConfigKey::Timeout => self.timeout.map_or(Value::Unset, |t| Value::Number(t.as_secs())),
		}
	}

	/// The configured authentication mode.
	pub fn auth_mode(&self) -> Result<AuthMode, Error> {
		AuthMode::parse(&self.auth)
	}

	/// Connection options for this configuration, with StartTLS on or off.
	pub(crate) fn connect_options(&self, starttls: bool) -> Result<ConnectOptions, Error> {
		Ok(ConnectOptions {
			starttls,
			no_tls_verify: self.tls.no_verify,
			tls_config: self.tls.client_config()?,
			timeout: self.timeout,
		})
	}
}

/// The ordered list of files a [`Config`] is loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
	/// Paths in increasing order of precedence
	paths: Vec<PathBuf>,
}

impl ConfigSources {
	/// The system wide file, the file in the home directory, the file in the
	/// current directory and then `explicit`, if given.
	#[must_use]
	pub fn standard(explicit: Option<&Path>) -> Self {
		let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
		match dirs::home_dir() {
			Some(home) => paths.push(home.join(HOME_CONFIG)),
			None => debug!("No home directory, skipping {HOME_CONFIG}"),
		}
		paths.push(PathBuf::from(LOCAL_CONFIG));
		paths.extend(explicit.map(Path::to_path_buf));
		Self { paths }
	}

	/// Sources consisting of exactly the given paths
	pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
		Self { paths: paths.into_iter().map(Into::into).collect() }
	}

	/// Appends a path with the highest precedence so far
	pub fn push(&mut self, path: impl Into<PathBuf>) {
		self.paths.push(path.into());
	}

	/// The paths, lowest precedence first
	#[must_use]
	pub fn paths(&self) -> &[PathBuf] {
		&self.paths
	}
}

/// Reads the `[AutoLDAP]` section of a file as `(key, value)` pairs in file
/// order. `Ok(None)` if the file does not exist or has no such section.
fn read_section(path: &Path) -> Result<Option<Vec<(String, String)>>, Error> {
	let unreadable = |source: ConfigFileError| Error::ConfigUnreadable { path: path.to_owned(), source };
	let contents = match std::fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			debug!("Configuration file {} does not exist, skipping", path.display());
			return Ok(None);
		}
		Err(err) => return Err(unreadable(err.into())),
	};
	// Backslashes are literal, DNs may contain escaped characters
	let options = ParseOption { enabled_escape: false, ..ParseOption::default() };
	let file = Ini::load_from_str_opt(&contents, options).map_err(|err| unreadable(err.into()))?;
	if file.section(Some(SECTION)).is_none() {
		debug!("No [{SECTION}] section in {}", path.display());
		return Ok(None);
	}
	let section = file
		.section_all(Some(SECTION))
		.flat_map(|properties| properties.iter())
		.map(|(key, value)| (key.to_owned(), value.to_owned()))
		.collect();
	Ok(Some(section))
}

/// Lenient boolean parsing. Anything unrecognized is `false`.
fn parse_flag(key: ConfigKey, value: &str) -> bool {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "yes" | "true" | "on" => true,
		"0" | "no" | "false" | "off" => false,
		_ => {
			warn!("Invalid boolean {value:?} for {key}, using false");
			false
		}
	}
}
