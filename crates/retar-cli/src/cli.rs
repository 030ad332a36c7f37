//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "retar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output (implies verbose)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Keep scratch directories for inspection instead of removing them
    #[arg(short, long, global = true)]
    pub keep: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the delta needed to reproduce a tarball
    Gendelta(GendeltaArgs),
    /// Regenerate a tarball from a delta and a working tree
    Gentar(GentarArgs),
    /// Generate a tarball's delta and store it on the delta branch
    Commit(CommitArgs),
    /// Regenerate a tarball from the data on the delta branch
    Checkout(CheckoutArgs),
    /// List the tarballs reproducible from the delta branch
    List(ListArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct GendeltaArgs {
    /// The tarball to generate a delta for
    #[arg(value_name = "TARBALL")]
    pub tarball: PathBuf,

    /// Where to write the delta
    #[arg(value_name = "DELTA")]
    pub delta: PathBuf,

    /// Sweep pbzip2 block sizes when nothing else reproduces the input
    #[arg(short, long)]
    pub try_harder: bool,
}

#[derive(clap::Args)]
pub struct GentarArgs {
    /// The delta produced by gendelta
    #[arg(value_name = "DELTA")]
    pub delta: PathBuf,

    /// Working tree whose contents match the tarball's
    #[arg(value_name = "WORKTREE")]
    pub worktree: PathBuf,

    /// Where to write the regenerated tarball
    #[arg(value_name = "TARBALL")]
    pub tarball: PathBuf,
}

#[derive(clap::Args)]
pub struct CommitArgs {
    /// The tarball to commit a delta for
    #[arg(value_name = "TARBALL")]
    pub tarball: PathBuf,

    /// Reference naming the upstream tree the tarball was made from;
    /// defaults to importing the tarball's own contents
    #[arg(value_name = "REFERENCE")]
    pub reference: Option<String>,

    /// Branch the delta is stored on
    #[arg(short, long, default_value = retar_core::repo::DEFAULT_BRANCH)]
    pub branch: String,

    /// Sweep pbzip2 block sizes when nothing else reproduces the input
    #[arg(short, long)]
    pub try_harder: bool,
}

#[derive(clap::Args)]
pub struct CheckoutArgs {
    /// The tarball to regenerate; its file name selects the stored delta
    #[arg(value_name = "TARBALL")]
    pub tarball: PathBuf,

    /// Branch the delta is stored on
    #[arg(short, long, default_value = retar_core::repo::DEFAULT_BRANCH)]
    pub branch: String,
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Branch the deltas are stored on
    #[arg(short, long, default_value = retar_core::repo::DEFAULT_BRANCH)]
    pub branch: String,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_gendelta_parses() {
        let cli = Cli::try_parse_from(["retar", "gendelta", "pkg.tar.gz", "pkg.delta"]).unwrap();
        match cli.command {
            Commands::Gendelta(args) => {
                assert_eq!(args.tarball, PathBuf::from("pkg.tar.gz"));
                assert!(!args.try_harder);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["retar", "-k", "-d", "gendelta", "a.tar", "a.delta"]).unwrap();
        assert!(cli.keep);
        assert!(cli.debug);
    }

    #[test]
    fn test_list_args_default_branch_is_pristine_tar() {
        let cli = Cli::try_parse_from(["retar", "list"]).unwrap();
        match cli.command {
            Commands::List(args) => assert_eq!(args.branch, "pristine-tar"),
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_commit_and_checkout_default_branch_is_pristine_tar() {
        let cli = Cli::try_parse_from(["retar", "commit", "pkg-1.0.tar.gz"]).unwrap();
        match cli.command {
            Commands::Commit(args) => assert_eq!(args.branch, "pristine-tar"),
            _ => panic!("wrong subcommand"),
        }

        let cli = Cli::try_parse_from(["retar", "checkout", "pkg-1.0.tar.gz"]).unwrap();
        match cli.command {
            Commands::Checkout(args) => assert_eq!(args.branch, "pristine-tar"),
            _ => panic!("wrong subcommand"),
        }
    }
}
