#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_docs_in_private_items)]
use std::{
	env,
	error::Error,
	fs,
	path::{Path, PathBuf},
};

use autoldap::{config::HOME_CONFIG, Config, ConfigKey, ConfigSources, Mechanism, StartTls, Value};
use serial_test::serial;

/// Points `HOME` and the working directory at temporary directories for the
/// duration of a test.
struct Sandbox {
	home: tempfile::TempDir,
	cwd: tempfile::TempDir,
	old_home: Option<std::ffi::OsString>,
	old_cwd: PathBuf,
}

impl Sandbox {
	fn new() -> Result<Self, Box<dyn Error>> {
		let sandbox = Sandbox {
			home: tempfile::tempdir()?,
			cwd: tempfile::tempdir()?,
			old_home: env::var_os("HOME"),
			old_cwd: env::current_dir()?,
		};
		env::set_var("HOME", sandbox.home.path());
		env::set_current_dir(sandbox.cwd.path())?;
		Ok(sandbox)
	}

	fn write(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, Box<dyn Error>> {
		let path = dir.join(name);
		fs::write(&path, contents)?;
		Ok(path)
	}
}

impl Drop for Sandbox {
	fn drop(&mut self) {
		let _ = env::set_current_dir(&self.old_cwd);
		match &self.old_home {
			Some(home) => env::set_var("HOME", home),
			None => env::remove_var("HOME"),
		}
	}
}

#[test]
#[serial]
fn standard_locations_in_order() -> Result<(), Box<dyn Error>> {
	let sandbox = Sandbox::new()?;
	Sandbox::write(
		sandbox.home.path(),
		HOME_CONFIG,
		"[AutoLDAP]\nURI = ldap://home\nbasedn = dc=home\nsaslmech = GSSAPI\n",
	)?;
	Sandbox::write(
		sandbox.cwd.path(),
		"autoldap.conf",
		"[AutoLDAP]\nURI = ldap://local\nstarttls = demand\nbinddn = cn=admin,dc=example,dc=org\n",
	)?;
	let explicit = Sandbox::write(
		sandbox.home.path(),
		"explicit.conf",
		"[AutoLDAP]\nstarttls = none\nprompt = maybe\n",
	)?;

	let sources = ConfigSources::standard(Some(&explicit));
	assert_eq!(sources.paths().len(), 4);
	assert_eq!(sources.paths()[1], sandbox.home.path().join(HOME_CONFIG));
	assert_eq!(sources.paths()[3], explicit);

	let config = Config::load(Some(&explicit))?;
	assert_eq!(config.uri, "ldap://local");
	assert_eq!(config.base_dn.as_deref(), Some("dc=home"));
	assert_eq!(config.mechanism, Mechanism::Gssapi);
	assert_eq!(config.starttls, StartTls::None);
	assert!(!config.prompt, "A malformed boolean in a file is false");
	assert_eq!(config.bind_dn.as_deref(), Some("cn=admin,dc=example,dc=org"));
	assert_eq!(config.get(ConfigKey::Auth), Value::Text("sasl"));

	Ok(())
}

#[test]
#[serial]
fn missing_files_are_skipped() -> Result<(), Box<dyn Error>> {
	let sandbox = Sandbox::new()?;
	let explicit = sandbox.cwd.path().join("does-not-exist.conf");

	let config = Config::load(Some(&explicit))?;
	assert_eq!(config.get(ConfigKey::Uri), Value::Text("ldapi:///"));
	assert_eq!(config.get(ConfigKey::Version), Value::Number(3));

	Ok(())
}

#[test]
#[serial]
fn corrupt_local_file_is_an_error() -> Result<(), Box<dyn Error>> {
	let sandbox = Sandbox::new()?;
	Sandbox::write(sandbox.cwd.path(), "autoldap.conf", "[AutoLDAP\nURI = ldap://broken\n")?;

	match Config::load(None) {
		Err(autoldap::Error::ConfigUnreadable { path, .. }) => {
			assert_eq!(path, PathBuf::from("autoldap.conf"));
		}
		other => panic!("Expected an unreadable configuration, got {other:?}"),
	}

	Ok(())
}
