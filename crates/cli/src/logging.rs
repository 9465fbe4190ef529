use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = warnings only
	// 1 (-v) = info, with connection/session lifecycle from cdp-runtime
	// 2 (-vv) = debug everywhere
	// 3+ (-vvv) = trace, including raw wire traffic (cdp_runtime::wire)
	let filter = match verbosity {
		0 => "warn",
		1 => "info,cdp_runtime=debug",
		2 => "debug",
		_ => "trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	// stdout carries command output only.
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
