#![allow(dead_code)]
use std::{
	cell::RefCell,
	collections::{HashMap, HashSet, VecDeque},
	error::Error,
	io,
	rc::Rc,
};

use autoldap::{
	directory::{ConnectOptions, Connection, Connector},
	ldap3::{LdapConn, LdapError, LdapResult, Scope, SearchEntry},
	search::PageRequest,
	Mechanism, SearchPage, SearchRequest,
};
use url::Url;

/// Something the scripted server saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	Connect { starttls: bool },
	SimpleBind { dn: String, password: String },
	SaslBind { mechanism: String, host: String },
	Search { base: String, scope: String, size_limit: Option<i32>, page: Option<PageRequest> },
	Unbind,
}

/// How the scripted server behaves
#[derive(Debug, Default)]
pub struct Script {
	/// Refuse every connection
	pub refuse_connections: bool,
	/// Fail connections that ask for StartTLS
	pub fail_starttls: bool,
	/// Result code of every bind, 0 for success
	pub bind_rc: u32,
	/// Responses to searches, in order. An empty page once exhausted.
	pub searches: VecDeque<Result<SearchPage, u32>>,
}

/// A [`Connector`] replaying a [`Script`] and recording what it is asked to do
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
	pub events: Rc<RefCell<Vec<Event>>>,
	pub script: Rc<RefCell<Script>>,
}

impl ScriptedConnector {
	pub fn new(script: Script) -> Self {
		Self { events: Rc::default(), script: Rc::new(RefCell::new(script)) }
	}

	pub fn events(&self) -> Vec<Event> {
		self.events.borrow().clone()
	}
}

#[derive(Debug)]
pub struct ScriptedConnection {
	events: Rc<RefCell<Vec<Event>>>,
	script: Rc<RefCell<Script>>,
}

/// An error as reported by a directory server
pub fn ldap_error(rc: u32, text: &str) -> LdapError {
	LdapError::LdapResult {
		result: LdapResult {
			rc,
			matched: String::new(),
			text: text.to_owned(),
			refs: Vec::new(),
			ctrls: Vec::new(),
		},
	}
}

impl Connector for ScriptedConnector {
	type Connection = ScriptedConnection;

	fn connect(&self, _uri: &Url, options: &ConnectOptions) -> Result<ScriptedConnection, LdapError> {
		self.events.borrow_mut().push(Event::Connect { starttls: options.starttls });
		let script = self.script.borrow();
		if script.refuse_connections {
			return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "unavailable").into());
		}
		if options.starttls && script.fail_starttls {
			return Err(ldap_error(2, "StartTLS not supported"));
		}
		Ok(ScriptedConnection { events: Rc::clone(&self.events), script: Rc::clone(&self.script) })
	}
}

impl ScriptedConnection {
	fn bind_result(&self) -> Result<(), LdapError> {
		match self.script.borrow().bind_rc {
			0 => Ok(()),
			rc => Err(ldap_error(rc, "bind failed")),
		}
	}
}

impl Connection for ScriptedConnection {
	fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError> {
		self.events
			.borrow_mut()
			.push(Event::SimpleBind { dn: dn.to_owned(), password: password.to_owned() });
		self.bind_result()
	}

	fn sasl_bind(&mut self, mechanism: &Mechanism, host: &str) -> Result<(), LdapError> {
		self.events.borrow_mut().push(Event::SaslBind {
			mechanism: mechanism.as_str().to_owned(),
			host: host.to_owned(),
		});
		self.bind_result()
	}

	fn search(
		&mut self,
		request: &SearchRequest,
		page: Option<&PageRequest>,
	) -> Result<SearchPage, LdapError> {
		self.events.borrow_mut().push(Event::Search {
			base: request.base.clone(),
			scope: format!("{:?}", request.scope),
			size_limit: request.size_limit,
			page: page.cloned(),
		});
		match self.script.borrow_mut().searches.pop_front() {
			Some(Ok(page)) => Ok(page),
			Some(Err(rc)) => Err(ldap_error(rc, "search failed")),
			None => Ok(SearchPage::default()),
		}
	}

	fn unbind(&mut self) -> Result<(), LdapError> {
		self.events.borrow_mut().push(Event::Unbind);
		Ok(())
	}
}

/// A search entry with a single `cn` value
pub fn entry(dn: &str, cn: &str) -> SearchEntry {
	SearchEntry {
		dn: dn.to_owned(),
		attrs: HashMap::from([("cn".to_owned(), vec![cn.to_owned()])]),
		bin_attrs: HashMap::new(),
	}
}

/// A page of entries followed by `cookie`
pub fn page(entries: Vec<SearchEntry>, cookie: &[u8]) -> SearchPage {
	SearchPage { entries, cookie: cookie.to_vec() }
}

// Helpers for the tests against the docker directory server

pub const LIVE_URI: &str = "ldap://localhost:1389";
pub const LIVE_ADMIN: &str = "cn=admin,dc=example,dc=org";
pub const LIVE_PASSWORD: &str = "adminpassword";

pub fn ldap_connect() -> Result<LdapConn, Box<dyn Error>> {
	let mut ldap = LdapConn::new(LIVE_URI)?;
	ldap.simple_bind(LIVE_ADMIN, LIVE_PASSWORD)?.success()?;
	Ok(ldap)
}

pub fn ldap_add_organizational_unit(ldap: &mut LdapConn, ou: &str) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", HashSet::from(["organizationalUnit"]))],
	)?
	.success()?;
	Ok(())
}

pub fn ldap_delete_organizational_unit(
	ldap: &mut LdapConn,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={},dc=example,dc=org", ou))?.success()?;
	Ok(())
}

pub fn ldap_add_user(ldap: &mut LdapConn, cn: &str, sn: &str) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("cn={},ou=users,dc=example,dc=org", cn),
		vec![("objectClass", HashSet::from(["inetOrgPerson"])), ("sn", HashSet::from([sn]))],
	)?
	.success()?;
	Ok(())
}

pub fn ldap_delete_user(ldap: &mut LdapConn, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=users,dc=example,dc=org", cn))?.success()?;
	Ok(())
}

/// Scope of a recorded search, as recorded
pub fn scope_name(scope: Scope) -> String {
	format!("{scope:?}")
}
