//! Search requests and page-wise iteration over large result sets.
use std::iter::FusedIterator;

use ldap3::{Scope, SearchEntry};
use tracing::debug;

use crate::{directory::Connection, error::Error};

/// Filter matching every entry
pub const DEFAULT_FILTER: &str = "(objectClass=*)";
/// Page size used when the caller has no preference
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Parameters of a single search operation
#[derive(Debug, Clone)]
pub struct SearchRequest {
	/// DN to start the search from
	pub base: String,
	/// How far below `base` to search
	pub scope: Scope,
	/// LDAP filter
	pub filter: String,
	/// Attributes to return, all user attributes if empty
	pub attrs: Vec<String>,
	/// Maximum number of entries the server should return
	pub size_limit: Option<i32>,
}

impl SearchRequest {
	/// A request without a size limit
	pub fn new(base: &str, scope: Scope, filter: &str, attrs: &[&str]) -> Self {
		Self {
			base: base.to_owned(),
			scope,
			filter: filter.to_owned(),
			attrs: attrs.iter().map(|attr| (*attr).to_owned()).collect(),
			size_limit: None,
		}
	}

	/// Limits the number of returned entries
	#[must_use]
	pub fn with_size_limit(mut self, limit: i32) -> Self {
		self.size_limit = Some(limit);
		self
	}
}

/// A request for one page of a paged search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
	/// Number of entries per page
	pub size: i32,
	/// Cookie from the previous page, empty for the first one
	pub cookie: Vec<u8>,
	/// Whether the server must reject the search if it can't page
	pub critical: bool,
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
	/// The entries of this page
	pub entries: Vec<SearchEntry>,
	/// Cookie to request the next page with, empty when there are no more
	pub cookie: Vec<u8>,
}

/// Iterator over the pages of a search using the [simple paged results
/// control], created by [`Session::paged_search`](crate::Session::paged_search).
///
/// Each call to `next` performs one search request carrying the cookie of
/// the previous page. Iteration ends once the server returns an empty cookie,
/// or after the first error. The iterator borrows the connection mutably, so
/// two paged searches can't interleave on one session.
///
/// [simple paged results control]: https://www.rfc-editor.org/rfc/rfc2696.html
#[derive(Debug)]
pub struct PagedSearch<'a, C> {
	/// Connection to search on, `None` if there is nothing to search
	connection: Option<&'a mut C>,
	/// The search to perform on every page
	request: SearchRequest,
	/// Entries per page
	page_size: i32,
	/// Cookie for the next request
	cookie: Vec<u8>,
	/// Criticality of the paging control
	critical: bool,
	/// Set once the last page has been produced
	done: bool,
}

impl<'a, C: Connection> PagedSearch<'a, C> {
	/// Starts a paged search, beginning with an empty cookie. The paging
	/// control is marked critical.
	pub fn new(connection: &'a mut C, request: SearchRequest, page_size: i32) -> Self {
		Self {
			connection: Some(connection),
			request,
			page_size,
			cookie: Vec::new(),
			critical: true,
			done: false,
		}
	}

	/// A paged search without any pages.
	pub(crate) fn empty(request: SearchRequest) -> Self {
		Self {
			connection: None,
			request,
			page_size: 0,
			cookie: Vec::new(),
			critical: true,
			done: true,
		}
	}

	/// Sets the criticality of the paging control. A server that doesn't
	/// support paging answers a non-critical request with all entries in one
	/// page.
	#[must_use]
	pub fn critical(mut self, critical: bool) -> Self {
		self.critical = critical;
		self
	}
}

impl<C: Connection> Iterator for PagedSearch<'_, C> {
	type Item = Result<Vec<SearchEntry>, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let connection = self.connection.as_deref_mut()?;
		let page = PageRequest {
			size: self.page_size,
			cookie: std::mem::take(&mut self.cookie),
			critical: self.critical,
		};

		match connection.search(&self.request, Some(&page)) {
			Ok(page) => {
				debug!("Received page of {} entries from {}", page.entries.len(), self.request.base);
				if page.cookie.is_empty() {
					self.done = true;
				} else {
					self.cookie = page.cookie;
				}
				Some(Ok(page.entries))
			}
			Err(err) => {
				self.done = true;
				Some(Err(err.into()))
			}
		}
	}
}

impl<C: Connection> FusedIterator for PagedSearch<'_, C> {}
