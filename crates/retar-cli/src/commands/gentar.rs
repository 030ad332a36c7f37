//! Gentar command implementation.

use crate::cli::GentarArgs;
use crate::error::add_archive_context;
use anyhow::Result;
use retar_core::Options;
use retar_core::driver;

pub fn execute(args: &GentarArgs, options: Options) -> Result<()> {
    add_archive_context(
        driver::gentar(&args.delta, &args.worktree, &args.tarball, &options),
        &args.tarball,
    )?;
    Ok(())
}
