//! Asking the user for a bind password.
use std::io;

/// Text shown when prompting for a simple bind password
pub const PASSWORD_PROMPT: &str = "LDAP Password: ";

/// Something that can ask for a password.
pub trait PasswordPrompt {
	/// Shows `prompt` and reads a password.
	fn prompt_password(&mut self, prompt: &str) -> io::Result<String>;
}

/// Reads the password from the controlling terminal with echo disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
	fn prompt_password(&mut self, prompt: &str) -> io::Result<String> {
		rpassword::prompt_password(prompt)
	}
}

impl<F> PasswordPrompt for F
where
	F: FnMut(&str) -> io::Result<String>,
{
	fn prompt_password(&mut self, prompt: &str) -> io::Result<String> {
		self(prompt)
	}
}
