//! List command implementation.

use crate::cli::ListArgs;
use anyhow::Context;
use anyhow::Result;
use retar_core::repo::GitRepo;
use std::env;

pub fn execute(args: &ListArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;
    let repo = GitRepo::open(&cwd);
    let branch_ref = repo.branch_ref(&args.branch)?;

    for file in repo.list_files(&branch_ref)? {
        if let Some(tarball) = file.strip_suffix(".delta") {
            println!("{tarball}");
        }
    }
    Ok(())
}
