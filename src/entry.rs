//! Helper methods for extracting data from search results.
use std::{collections::HashMap, io};

use ldap3::SearchEntry;

/// Returns the first value of the attribute `name`, or `None` if the
/// attribute is absent or has no values.
#[must_use]
pub fn unpack_one<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
	attrs.get(name)?.first().map(String::as_str)
}

/// An extension trait for [`SearchEntry`] that provides convenience methods for
/// extracting data.
pub trait SearchEntryExt {
	/// Get the first value of an attribute. Will return `None` if attribute
	/// value is not valid UTF-8.
	fn attr_first(&self, attr: &str) -> Option<&str>;

	/// Writes the entry in an LDIF-like form, followed by an empty line.
	/// Binary values are summarized rather than encoded.
	fn write_ldif<W: io::Write>(&self, out: &mut W) -> io::Result<()>;
}

impl SearchEntryExt for SearchEntry {
	fn attr_first(&self, attr: &str) -> Option<&str> {
		unpack_one(&self.attrs, attr)
	}

	fn write_ldif<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
		writeln!(out, "dn: {}", self.dn)?;
		let mut names: Vec<_> = self.attrs.keys().collect();
		names.sort();
		for name in names {
			for value in &self.attrs[name] {
				writeln!(out, "{name}: {value}")?;
			}
		}
		let mut names: Vec<_> = self.bin_attrs.keys().collect();
		names.sort();
		for name in names {
			for value in &self.bin_attrs[name] {
				writeln!(out, "# {name}: {} bytes of binary data", value.len())?;
			}
		}
		writeln!(out)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::collections::HashMap;

	use ldap3::SearchEntry;

	use super::{unpack_one, SearchEntryExt};

	fn entry() -> SearchEntry {
		SearchEntry {
			dn: String::from("uid=foo,dc=example,dc=com"),
			attrs: [
				(String::from("name"), vec![String::from("Foo Bar"), String::from("Bar McBaz")]),
				(String::from("mail"), vec![String::from("foo@example.com")]),
				(String::from("empty"), vec![]),
			]
			.into_iter()
			.collect(),
			bin_attrs: [(String::from("jpegPhoto"), vec![vec![0xff, 0xd8, 0xff]])]
				.into_iter()
				.collect(),
		}
	}

	#[test]
	fn attr_first() {
		let entry = entry();
		assert_eq!(
			entry.attr_first("attribute_does_not_exist"),
			None,
			"Undefined attributes should return None"
		);
		assert_eq!(entry.attr_first("name"), Some("Foo Bar"), "Should return the first value");
		assert_ne!(entry.attr_first("name"), Some("Bar McBaz"), "Should return the correct value");
		assert_eq!(entry.attr_first("empty"), None, "Attributes without values return None");
	}

	#[test]
	fn unpack_one_missing() {
		let attrs = HashMap::new();
		assert_eq!(unpack_one(&attrs, "cn"), None);
	}

	#[test]
	fn write_ldif() {
		let mut out = Vec::new();
		entry().write_ldif(&mut out).unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"dn: uid=foo,dc=example,dc=com\n\
			 mail: foo@example.com\n\
			 name: Foo Bar\n\
			 name: Bar McBaz\n\
			 # jpegPhoto: 3 bytes of binary data\n\
			 \n"
		);
	}
}
