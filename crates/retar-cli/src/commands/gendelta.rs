//! Gendelta command implementation.

use crate::cli::GendeltaArgs;
use crate::error::add_archive_context;
use anyhow::Result;
use retar_core::Options;
use retar_core::driver;

pub fn execute(args: &GendeltaArgs, mut options: Options) -> Result<()> {
    if args.try_harder {
        options = options.with_try_harder();
    }
    add_archive_context(
        driver::gendelta(&args.tarball, &args.delta, &options),
        &args.tarball,
    )?;
    Ok(())
}
