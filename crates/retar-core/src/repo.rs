//! Git-backed content-tracking store.
//!
//! The reproduction engine only needs a handful of capabilities from the
//! store: resolve a name to a tree snapshot, materialise a tree into a
//! directory, read and write blobs on a branch, and probe branches. This
//! implementation drives the `git` binary; writes go through a throwaway
//! index so the user's checkout and index are never touched.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use log::debug;

use crate::Error;
use crate::Result;
use crate::process;
use crate::process::ChildGuard;

/// Branch deltas are stored on unless the user picks another.
pub const DEFAULT_BRANCH: &str = "pristine-tar";

/// Handle on a git repository at a fixed directory.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    /// Opens the repository containing `dir`. No validation happens
    /// here; the first command run against a non-repository fails with
    /// git's own diagnostic.
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = process::command("git");
        cmd.current_dir(&self.dir);
        cmd
    }

    fn run(&self, cmd: &mut Command, args: &[&str]) -> Result<Vec<u8>> {
        let output = cmd
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::SubprocessFailure {
                program: "git".to_string(),
                status: format!("failed to start: {e}"),
            })?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(Error::SubprocessFailure {
                program: "git".to_string(),
                status: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    fn run_text(&self, cmd: &mut Command, args: &[&str]) -> Result<String> {
        let stdout = self.run(cmd, args)?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Resolves `name` to a tree snapshot id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryLookup`] when the name does not name a
    /// tree-ish.
    pub fn resolve_tree(&self, name: &str) -> Result<String> {
        self.run_text(
            &mut self.command(),
            &["rev-parse", "--verify", "--quiet", &format!("{name}^{{tree}}")],
        )
        .map_err(|_| Error::RepositoryLookup {
            name: name.to_string(),
            reason: "does not name a tree".to_string(),
        })
    }

    fn ref_exists(&self, full_ref: &str) -> bool {
        self.command()
            .args(["show-ref", "--verify", "--quiet", full_ref])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    /// Remote-tracking refs whose final component is `branch`.
    fn remote_branches(&self, branch: &str) -> Result<Vec<String>> {
        let listing = self.run_text(
            &mut self.command(),
            &["for-each-ref", "--format=%(refname)", "refs/remotes"],
        )?;
        let suffix = format!("/{branch}");
        Ok(listing
            .lines()
            .filter(|r| r.ends_with(&suffix))
            .map(str::to_string)
            .collect())
    }

    /// Finds the ref holding the delta branch: the local branch when it
    /// exists, otherwise a single unambiguous remote-tracking branch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryLookup`] listing the candidates when
    /// several remotes carry the branch and no local branch decides,
    /// and when no ref matches at all.
    pub fn branch_ref(&self, branch: &str) -> Result<String> {
        let local = format!("refs/heads/{branch}");
        if self.ref_exists(&local) {
            return Ok(local);
        }
        let mut remotes = self.remote_branches(branch)?;
        match remotes.len() {
            1 => Ok(remotes.remove(0)),
            0 => Err(Error::RepositoryLookup {
                name: branch.to_string(),
                reason: "no local or remote branch by that name".to_string(),
            }),
            _ => Err(Error::RepositoryLookup {
                name: branch.to_string(),
                reason: format!("ambiguous remote branches: {}", remotes.join(", ")),
            }),
        }
    }

    /// Reads the blob at `path` on `refname`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryLookup`] when the path does not exist
    /// on that ref.
    pub fn read_blob(&self, refname: &str, path: &str) -> Result<Vec<u8>> {
        let spec = format!("{refname}:{path}");
        self.run(&mut self.command(), &["cat-file", "blob", &spec])
            .map_err(|_| Error::RepositoryLookup {
                name: spec,
                reason: "no such blob".to_string(),
            })
    }

    /// Lists the file names at the top level of `refname`.
    pub fn list_files(&self, refname: &str) -> Result<Vec<String>> {
        let listing =
            self.run_text(&mut self.command(), &["ls-tree", "--name-only", refname])?;
        Ok(listing.lines().map(str::to_string).collect())
    }

    /// Materialises the tree-ish `treeish` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns subprocess errors from `git archive` and unpack errors.
    pub fn checkout_tree(&self, treeish: &str, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        let child = self
            .command()
            .args(["archive", "--format=tar", treeish])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::SubprocessFailure {
                program: "git".to_string(),
                status: format!("failed to start: {e}"),
            })?;
        let mut guard = ChildGuard::new(child, "git archive");
        let stdout = guard.take_stdout().ok_or_else(|| Error::SubprocessFailure {
            program: "git".to_string(),
            status: "no stdout pipe".to_string(),
        })?;
        tar::Archive::new(stdout).unpack(dest)?;
        let status = guard.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::SubprocessFailure {
                program: "git archive".to_string(),
                status: status.to_string(),
            })
        }
    }

    /// Imports the contents of `dir` as a tree object, without touching
    /// the repository's own index or working tree. Returns the tree id.
    ///
    /// # Errors
    ///
    /// Returns subprocess errors from the underlying git commands.
    pub fn import_tree(&self, dir: &Path) -> Result<String> {
        let git_dir =
            self.run_text(&mut self.command(), &["rev-parse", "--absolute-git-dir"])?;
        let index = tempfile::TempDir::with_prefix("retar-index-")?;
        let index_file = index.path().join("index");

        let mut add = process::command("git");
        add.current_dir(dir)
            .env("GIT_DIR", &git_dir)
            .env("GIT_INDEX_FILE", &index_file);
        self.run(&mut add, &["add", "-A", "."])?;

        let mut write_tree = process::command("git");
        write_tree
            .current_dir(dir)
            .env("GIT_DIR", &git_dir)
            .env("GIT_INDEX_FILE", &index_file);
        self.run_text(&mut write_tree, &["write-tree"])
    }

    /// Writes `files` as blobs on `branch` in one commit, creating the
    /// branch when needed. Existing files on the branch are preserved;
    /// same-named files are replaced.
    ///
    /// # Errors
    ///
    /// Returns subprocess errors; an ambiguous remote branch surfaces as
    /// [`Error::RepositoryLookup`] before anything is written.
    pub fn write_files(
        &self,
        branch: &str,
        files: &[(String, Vec<u8>)],
        message: &str,
    ) -> Result<()> {
        let index = tempfile::TempDir::with_prefix("retar-index-")?;
        let index_file = index.path().join("index");
        let with_index = |cmd: &mut Command| {
            cmd.env("GIT_INDEX_FILE", &index_file);
        };

        let parent = match self.branch_ref(branch) {
            Ok(base) => {
                let mut cmd = self.command();
                with_index(&mut cmd);
                self.run(&mut cmd, &["read-tree", &base])?;
                Some(self.run_text(&mut self.command(), &["rev-parse", "--verify", &base])?)
            }
            Err(Error::RepositoryLookup { reason, .. })
                if reason.starts_with("no local or remote") =>
            {
                let mut cmd = self.command();
                with_index(&mut cmd);
                self.run(&mut cmd, &["read-tree", "--empty"])?;
                None
            }
            Err(err) => return Err(err),
        };

        for (path, bytes) in files {
            let blob = self.hash_object(bytes)?;
            let mut cmd = self.command();
            with_index(&mut cmd);
            self.run(
                &mut cmd,
                &[
                    "update-index",
                    "--add",
                    "--cacheinfo",
                    &format!("100644,{blob},{path}"),
                ],
            )?;
        }

        let mut cmd = self.command();
        with_index(&mut cmd);
        let tree = self.run_text(&mut cmd, &["write-tree"])?;

        let mut commit_args = vec!["commit-tree", tree.as_str(), "-m", message];
        if let Some(parent) = parent.as_deref() {
            commit_args.push("-p");
            commit_args.push(parent);
        }
        let commit = self.run_text(&mut self.command(), &commit_args)?;

        self.run(
            &mut self.command(),
            &["update-ref", &format!("refs/heads/{branch}"), &commit],
        )?;
        debug!("committed {} file(s) to {branch}", files.len());
        Ok(())
    }

    fn hash_object(&self, bytes: &[u8]) -> Result<String> {
        let mut child = self
            .command()
            .args(["hash-object", "-w", "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::SubprocessFailure {
                program: "git".to_string(),
                status: format!("failed to start: {e}"),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            // A write failure surfaces through the exit status below.
            let _ = stdin.write_all(bytes);
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::SubprocessFailure {
                program: "git hash-object".to_string(),
                status: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
