use anyhow::Result;
use clap::Parser;
use kmanifest::{
	commands::{
		manifest::{self, ManifestArgs},
		util::BrokenPipeGuard,
	},
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

fn main() -> Result<()> {
	let args = ManifestArgs::parse();

	let _telemetry = telemetry::init(args.log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());
	manifest::run(args, stdout)
}
