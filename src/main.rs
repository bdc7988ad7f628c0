//! Search an LDAP directory using the layered autoldap configuration.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::{io::Write, process::ExitCode};

use autoldap::{cli::Args, Config, Error, SearchEntryExt, Session};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn main() -> ExitCode {
	let args = Args::parse();

	let level = match args.verbose {
		0 => LevelFilter::WARN,
		1 => LevelFilter::INFO,
		2 => LevelFilter::DEBUG,
		_ => LevelFilter::TRACE,
	};
	let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{err}");
			eprintln!("autoldap: {err}");
			ExitCode::FAILURE
		}
	}
}

/// Loads the configuration, binds and prints the search results.
fn run(args: &Args) -> Result<(), Error> {
	let mut config = Config::load(args.config.as_deref())?;
	config.apply_overrides(args.overrides());
	if args.print_config {
		print!("{config}");
		return Ok(());
	}

	let mut session = Session::open(config)?;
	let attrs: Vec<&str> = args.attrs.iter().map(String::as_str).collect();
	let mut out = std::io::stdout().lock();
	for page in
		session.paged_search(None, args.scope.into(), args.page_size, &args.filter, &attrs)?
	{
		for entry in page? {
			entry.write_ldif(&mut out)?;
		}
	}
	out.flush()?;
	session.unbind()
}
