//! Checkout command implementation.

use crate::cli::CheckoutArgs;
use crate::error::add_archive_context;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use retar_core::Options;
use retar_core::Scratch;
use retar_core::driver;
use retar_core::repo::GitRepo;
use std::env;

pub fn execute(args: &CheckoutArgs, options: Options) -> Result<()> {
    let Some(name) = args.tarball.file_name().map(|n| n.to_string_lossy().into_owned())
    else {
        bail!("{} has no file name", args.tarball.display());
    };

    let cwd = env::current_dir().context("failed to get current directory")?;
    let repo = GitRepo::open(&cwd);

    // Resolve the branch before fetching anything, so an ambiguous
    // remote setup aborts with the candidate list and nothing else.
    let branch_ref = repo.branch_ref(&args.branch)?;

    let delta = repo
        .read_blob(&branch_ref, &format!("{name}.delta"))
        .with_context(|| format!("no delta stored for {name} on {branch_ref}"))?;
    let id = repo
        .read_blob(&branch_ref, &format!("{name}.id"))
        .with_context(|| format!("no tree id stored for {name} on {branch_ref}"))?;
    let tree = String::from_utf8_lossy(&id).trim().to_string();

    let scratch = Scratch::new(&options)?;
    let worktree = scratch.subdir("worktree")?;
    repo.checkout_tree(&tree, &worktree)
        .with_context(|| format!("failed to materialise tree {tree}"))?;

    add_archive_context(
        driver::gentar_bytes(&delta, &worktree, &args.tarball, &options),
        &args.tarball,
    )?;

    println!("regenerated {}", args.tarball.display());
    Ok(())
}
