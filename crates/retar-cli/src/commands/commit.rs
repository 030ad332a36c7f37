//! Commit command implementation.

use crate::cli::CommitArgs;
use crate::error::add_archive_context;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use retar_core::Options;
use retar_core::Scratch;
use retar_core::driver;
use retar_core::repo::GitRepo;
use std::env;

pub fn execute(args: &CommitArgs, mut options: Options) -> Result<()> {
    if args.try_harder {
        options = options.with_try_harder();
    }
    let Some(name) = args.tarball.file_name().map(|n| n.to_string_lossy().into_owned())
    else {
        bail!("{} has no file name", args.tarball.display());
    };

    let cwd = env::current_dir().context("failed to get current directory")?;
    let repo = GitRepo::open(&cwd);

    let delta =
        add_archive_context(driver::gendelta_bytes(&args.tarball, &options), &args.tarball)?;

    // The sidecar id records which tree the delta applies against.
    let tree = match &args.reference {
        Some(reference) => repo
            .resolve_tree(reference)
            .with_context(|| format!("cannot resolve reference {reference}"))?,
        None => {
            let scratch = Scratch::new(&options)?;
            let source_root = add_archive_context(
                driver::extract_source_root(&args.tarball, &scratch),
                &args.tarball,
            )?;
            repo.import_tree(&source_root)
                .context("failed to import tarball contents")?
        }
    };

    let files = vec![
        (format!("{name}.delta"), delta),
        (format!("{name}.id"), format!("{tree}\n").into_bytes()),
    ];
    repo.write_files(&args.branch, &files, &format!("retar data for {name}"))
        .with_context(|| format!("failed to store delta on branch {}", args.branch))?;

    println!("committed delta for {name} to branch {}", args.branch);
    Ok(())
}
