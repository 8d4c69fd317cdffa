//! Git repository backend: one vault as a tree of markdown files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use super::providers::{authenticated_url, clone_url, redact};
use super::runner::{GitCli, GitOutput, GitRunner};
use super::worktree::{read_tree, write_tree};
use crate::codec::{METADATA_PATH, RepoMetadata, is_note_path, notes_to_files, parse_repository};
use crate::error::{KurumiError, Result};
use crate::merge::lww_merge;
use crate::store::{DocumentStore, ImportBatch, ImportSummary, views};
use crate::sync::status::{StatusTracker, SyncPhase};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_AUTHOR_NAME: &str = "Kurumi";
pub const DEFAULT_AUTHOR_EMAIL: &str = "kurumi@localhost";

/// Commit whose files the store has already absorbed.
pub const SYNCED_REF: &str = "refs/kurumi/synced";

/// Connection and identity settings for a git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSettings {
    pub repo_url: String,
    pub branch: String,
    pub token: String,
    pub author_name: String,
    pub author_email: String,
    pub cors_proxy: Option<String>,
}

impl GitSettings {
    pub fn new(repo_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: DEFAULT_BRANCH.to_string(),
            token: token.into(),
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
            cors_proxy: None,
        }
    }
}

/// What the pull step found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The store has never absorbed this working copy; every file is new.
    Fresh,
    /// Remote commits were merged; `changed` paths differ from the last sync,
    /// whose side-car was `base_sidecar`.
    Updated {
        changed: BTreeSet<String>,
        base_sidecar: Option<String>,
    },
    /// Nothing arrived since the last sync.
    UpToDate,
    /// The remote branch does not exist yet.
    NothingToPull,
    /// Git could not merge. The working copy keeps the local files, a merge
    /// with `FETCH_HEAD` is pending, and `remote_files` are the remote
    /// versions of the files the remote changed.
    NeedsReconcile {
        remote_files: BTreeMap<String, String>,
        base_sidecar: Option<String>,
    },
}

impl PullOutcome {
    /// Whether the next commit must conclude a pending merge.
    pub fn concludes_merge(&self) -> bool {
        matches!(self, PullOutcome::NeedsReconcile { .. })
    }
}

/// What the store already absorbed: paths changed since then and the
/// side-car of that time.
struct Baseline {
    changed: BTreeSet<String>,
    sidecar: Option<RepoMetadata>,
}

impl Baseline {
    fn new(changed: BTreeSet<String>, sidecar: Option<&str>) -> Self {
        Self {
            changed,
            sidecar: sidecar.and_then(RepoMetadata::parse),
        }
    }
}

/// A working copy of one remote repository.
pub struct GitBackend {
    settings: GitSettings,
    workdir: PathBuf,
    runner: Arc<dyn GitRunner>,
}

impl std::fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBackend")
            .field("repo_url", &self.settings.repo_url)
            .field("branch", &self.settings.branch)
            .field("workdir", &self.workdir)
            .finish()
    }
}

/// Map a failed git invocation to an error, auth and network first.
fn classify_failure(command: &str, message: String) -> KurumiError {
    let lower = message.to_lowercase();
    let is_auth = [
        "authentication failed",
        "could not read username",
        "invalid username or password",
        "permission denied",
        "error: 401",
        "error: 403",
    ]
    .iter()
    .any(|needle| lower.contains(needle));
    if is_auth {
        return KurumiError::Auth(message);
    }

    let is_network = [
        "could not resolve host",
        "failed to connect",
        "connection refused",
        "connection timed out",
        "unable to access",
    ]
    .iter()
    .any(|needle| lower.contains(needle));
    if is_network {
        return KurumiError::Network(message);
    }

    KurumiError::Git {
        command: command.to_string(),
        message,
    }
}

/// Paths to add and to remove, from `git status --porcelain -z`.
fn parse_porcelain(output: &str) -> (Vec<String>, Vec<String>) {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut entries = output.split('\0').filter(|e| !e.is_empty());
    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (code, path) = entry.split_at(3);
        let code = &code[..2];
        if code.contains('R') || code.contains('C') {
            entries.next();
        }
        if code.contains('D') {
            removed.push(path.to_string());
        } else {
            added.push(path.to_string());
        }
    }
    (added, removed)
}

fn split_paths(output: &str) -> BTreeSet<String> {
    output
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// The git subcommand in an argument list, skipping `-c key=value` options.
fn subcommand(args: &[String]) -> String {
    args.iter()
        .find(|a| !a.starts_with('-') && !a.contains('='))
        .cloned()
        .unwrap_or_default()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

impl GitBackend {
    pub fn new(settings: GitSettings, workdir: impl Into<PathBuf>, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            settings,
            workdir: workdir.into(),
            runner,
        }
    }

    /// Backend using the system `git` binary.
    pub fn with_cli(settings: GitSettings, workdir: impl Into<PathBuf>) -> Self {
        Self::new(settings, workdir, Arc::new(GitCli::default()))
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn has_working_copy(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    fn remote(&self) -> Result<String> {
        authenticated_url(
            &self.settings.repo_url,
            &self.settings.token,
            self.settings.cors_proxy.as_deref(),
        )
        .map(String::from)
    }

    fn identity_args(&self) -> Vec<String> {
        vec![
            "-c".into(),
            format!("user.name={}", self.settings.author_name),
            "-c".into(),
            format!("user.email={}", self.settings.author_email),
            "-c".into(),
            "commit.gpgsign=false".into(),
        ]
    }

    async fn run(&self, dir: &Path, args: Vec<String>) -> Result<GitOutput> {
        let command = subcommand(&args);
        log::debug!("git {} in {}", command, dir.display());

        let mut output = self.runner.run(dir, &args).await.map_err(|e| match e {
            KurumiError::Git { command, message } => KurumiError::Git {
                command,
                message: redact(&message, &self.settings.token),
            },
            other => other,
        })?;
        output.stdout = redact(&output.stdout, &self.settings.token);
        output.stderr = redact(&output.stderr, &self.settings.token);
        Ok(output)
    }

    /// Run and turn a non-zero exit into an error.
    async fn run_checked(&self, dir: &Path, args: Vec<String>) -> Result<GitOutput> {
        let command = subcommand(&args);
        let output = self.run(dir, args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(classify_failure(&command, output.stderr.trim().to_string()))
        }
    }

    /// Clone the remote unless a working copy exists. Returns true if a new
    /// working copy was created.
    pub async fn ensure_working_copy(&self, status: &StatusTracker) -> Result<bool> {
        if self.has_working_copy() {
            return Ok(false);
        }
        status.set_phase(SyncPhase::Cloning);

        let parent = self.workdir.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|source| KurumiError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;

        let target = self.workdir.to_string_lossy().into_owned();
        let output = self
            .run(
                parent,
                vec![
                    "clone".into(),
                    "--depth".into(),
                    "1".into(),
                    "--single-branch".into(),
                    "--branch".into(),
                    self.settings.branch.clone(),
                    self.remote()?,
                    target,
                ],
            )
            .await?;

        let origin = clone_url(&self.settings.repo_url);
        if output.success {
            self.run_checked(&self.workdir, args(&["remote", "set-url", "origin", &origin]))
                .await?;
            log::info!("Cloned {} into {}", origin, self.workdir.display());
            return Ok(true);
        }

        let stderr = output.stderr.to_lowercase();
        if !(stderr.contains("not found in upstream") || stderr.contains("empty repository")) {
            return Err(classify_failure("clone", output.stderr.trim().to_string()));
        }

        // Empty remote: start a local history that the first push creates.
        fs::create_dir_all(&self.workdir).map_err(|source| KurumiError::FileWrite {
            path: self.workdir.clone(),
            source,
        })?;
        let initial_branch = format!("--initial-branch={}", self.settings.branch);
        self.run_checked(&self.workdir, args(&["init", "--quiet", &initial_branch]))
            .await?;
        self.run_checked(&self.workdir, args(&["remote", "add", "origin", &origin]))
            .await?;
        log::info!("Remote {} is empty, initialized {}", origin, self.workdir.display());
        Ok(true)
    }

    /// Commit id of `rev`, `None` when it does not resolve.
    async fn resolve(&self, rev: &str) -> Result<Option<String>> {
        let output = self
            .run(&self.workdir, args(&["rev-parse", "--verify", "--quiet", rev]))
            .await?;
        let id = output.stdout.trim();
        Ok((output.success && !id.is_empty()).then(|| id.to_string()))
    }

    async fn changed_between(&self, from: &str, to: &str) -> Result<BTreeSet<String>> {
        let diff = self
            .run_checked(&self.workdir, args(&["diff", "--name-only", "-z", from, to]))
            .await?;
        Ok(split_paths(&diff.stdout))
    }

    /// The side-car as of `rev`, if it existed there.
    async fn sidecar_at(&self, rev: Option<&str>) -> Result<Option<String>> {
        let Some(rev) = rev else {
            return Ok(None);
        };
        let show = self
            .run(&self.workdir, vec!["show".into(), format!("{}:{}", rev, METADATA_PATH)])
            .await?;
        Ok(show.success.then_some(show.stdout))
    }

    /// Contents of the files `FETCH_HEAD` changed since `since`, or of all its
    /// files when the histories cannot be compared.
    async fn fetched_files(&self, since: Option<&str>) -> Result<BTreeMap<String, String>> {
        let paths = match since {
            Some(since) => {
                let diff = self
                    .run(&self.workdir, args(&["diff", "--name-only", "-z", since, "FETCH_HEAD"]))
                    .await?;
                diff.success.then(|| split_paths(&diff.stdout))
            }
            None => None,
        };
        let paths = match paths {
            Some(paths) => paths,
            None => {
                let tree = self
                    .run_checked(
                        &self.workdir,
                        args(&["ls-tree", "-r", "--name-only", "-z", "FETCH_HEAD"]),
                    )
                    .await?;
                split_paths(&tree.stdout)
            }
        };

        let mut files = BTreeMap::new();
        for path in paths
            .into_iter()
            .filter(|p| is_note_path(p) || p == METADATA_PATH)
        {
            let show = self
                .run(&self.workdir, vec!["show".into(), format!("FETCH_HEAD:{}", path)])
                .await?;
            // Deleted on the remote.
            if show.success {
                files.insert(path, show.stdout);
            }
        }
        Ok(files)
    }

    /// Fetch the tracked branch and merge it into the working copy.
    pub async fn pull(&self, status: &StatusTracker) -> Result<PullOutcome> {
        self.ensure_working_copy(status).await?;
        status.set_phase(SyncPhase::Pulling);

        let fetch = self
            .run(
                &self.workdir,
                vec!["fetch".into(), self.remote()?, self.settings.branch.clone()],
            )
            .await?;
        if !fetch.success {
            if fetch.stderr.to_lowercase().contains("couldn't find remote ref") {
                log::debug!("Remote branch '{}' does not exist yet", self.settings.branch);
                return Ok(PullOutcome::NothingToPull);
            }
            return Err(classify_failure("fetch", fetch.stderr.trim().to_string()));
        }

        let synced = self.resolve(SYNCED_REF).await?;
        if self.resolve("HEAD").await?.is_none() {
            self.run_checked(&self.workdir, args(&["reset", "--hard", "--quiet", "FETCH_HEAD"]))
                .await?;
            return Ok(PullOutcome::Fresh);
        }

        let mut merge = self.identity_args();
        merge.extend(args(&["merge", "--no-edit", "-X", "theirs", "FETCH_HEAD"]));
        let output = self.run(&self.workdir, merge).await?;
        if output.success {
            let head = self.resolve("HEAD").await?;
            return Ok(match (synced, head) {
                (None, _) | (_, None) => PullOutcome::Fresh,
                (Some(synced), Some(head)) if synced == head => PullOutcome::UpToDate,
                (Some(synced), Some(head)) => {
                    let changed = self.changed_between(&synced, &head).await?;
                    let base_sidecar = if changed.contains(METADATA_PATH) {
                        self.sidecar_at(Some(synced.as_str())).await?
                    } else {
                        None
                    };
                    PullOutcome::Updated {
                        changed,
                        base_sidecar,
                    }
                }
            });
        }

        log::warn!(
            "Remote has changes to reconcile: {}",
            format!("{}{}", output.stdout, output.stderr).trim()
        );
        if self.resolve("MERGE_HEAD").await?.is_some() {
            self.run_checked(&self.workdir, args(&["merge", "--abort"])).await?;
        }
        let remote_files = self.fetched_files(synced.as_deref()).await?;
        let base_sidecar = self.sidecar_at(synced.as_deref()).await?;

        // Keep the local tree but record the remote as a parent, so the
        // reconciled commit fast-forwards the remote branch.
        self.run_checked(
            &self.workdir,
            args(&[
                "merge",
                "--quiet",
                "--no-commit",
                "--allow-unrelated-histories",
                "-s",
                "ours",
                "FETCH_HEAD",
            ]),
        )
        .await?;
        Ok(PullOutcome::NeedsReconcile {
            remote_files,
            base_sidecar,
        })
    }

    /// Merge what the pull brought into the store's active vault, then write
    /// the resulting vault back to the working copy.
    ///
    /// Only files the remote changed are imported, so files of entities
    /// deleted locally are removed instead of read back. Returns `None` when
    /// there was nothing to import.
    pub fn merge_local(
        &self,
        store: &mut DocumentStore,
        pulled: &PullOutcome,
    ) -> Result<Option<ImportSummary>> {
        let summary = match pulled {
            PullOutcome::UpToDate | PullOutcome::NothingToPull => None,
            PullOutcome::Fresh => Some(self.import_files(store, read_tree(&self.workdir)?, None)),
            PullOutcome::Updated {
                changed,
                base_sidecar,
            } => {
                let since = Baseline::new(changed.clone(), base_sidecar.as_deref());
                Some(self.import_files(store, read_tree(&self.workdir)?, Some(&since)))
            }
            PullOutcome::NeedsReconcile {
                remote_files,
                base_sidecar,
            } => {
                let mut files = read_tree(&self.workdir)?;
                files.extend(remote_files.clone());
                let changed = remote_files.keys().cloned().collect();
                let since = Baseline::new(changed, base_sidecar.as_deref());
                Some(self.import_files(store, files, Some(&since)))
            }
        };

        self.write_vault(store)?;
        Ok(summary)
    }

    /// LWW-import repository files into the active vault. With a baseline,
    /// only changed notes and side-car entries that differ from the
    /// baseline's side-car are considered.
    fn import_files(
        &self,
        store: &mut DocumentStore,
        files: BTreeMap<String, String>,
        since: Option<&Baseline>,
    ) -> ImportSummary {
        let metadata = files.get(METADATA_PATH).and_then(|json| RepoMetadata::parse(json));
        let vault_id = store.current_vault_id().to_string();

        let files = match since {
            None => files,
            Some(since) => files
                .into_iter()
                .filter(|(path, _)| since.changed.contains(path))
                .collect(),
        };
        let mut remote = parse_repository(&files, metadata.as_ref(), &vault_id);
        // Side-car entities only count when the side-car changed, and then
        // only entries that differ from the baseline's side-car.
        if let (Some(since), Some(metadata)) = (since, metadata.as_ref()) {
            if since.changed.contains(METADATA_PATH) {
                let fresh = match &since.sidecar {
                    Some(base) => metadata.changed_since(base),
                    None => metadata.clone(),
                };
                remote.folders.retain(|f| fresh.folders.contains_key(&f.id));
                remote.people.retain(|p| fresh.people.contains_key(&p.id));
                remote.events.retain(|e| fresh.events.contains_key(&e.id));
            } else {
                remote.folders.clear();
                remote.people.clear();
                remote.events.clear();
            }
        }
        log::debug!(
            "Importing {} notes and {} folders from the working copy",
            remote.notes.len(),
            remote.folders.len()
        );

        let snapshot = store.snapshot();
        let batch = ImportBatch {
            folders: lww_merge(views::folders_in_vault(&snapshot, &vault_id), remote.folders),
            notes: lww_merge(views::notes_in_vault(&snapshot, &vault_id), remote.notes),
            people: lww_merge(views::people_in_vault(&snapshot, &vault_id), remote.people),
            events: lww_merge(views::events_in_vault(&snapshot, &vault_id), remote.events),
        };
        store.import_entities(batch)
    }

    /// Write the active vault as markdown plus side-car.
    pub fn write_vault(&self, store: &DocumentStore) -> Result<()> {
        let vault = store
            .current_vault()
            .ok_or_else(|| KurumiError::VaultNotFound(store.current_vault_id().to_string()))?;
        let snapshot = store.snapshot();
        let notes = views::notes_in_vault(&snapshot, &vault.id);
        let folders = views::folders_in_vault(&snapshot, &vault.id);
        let people = views::people_in_vault(&snapshot, &vault.id);
        let events = views::events_in_vault(&snapshot, &vault.id);

        let metadata = RepoMetadata::build(&vault, &folders, &notes, &people, &events);
        write_tree(&self.workdir, &notes_to_files(&notes, &folders), &metadata.to_json()?)?;
        Ok(())
    }

    /// Stage and commit working copy changes. Returns the new commit id, or
    /// `None` when nothing changed and no merge is pending.
    pub async fn commit(&self, concludes_merge: bool) -> Result<Option<String>> {
        let status = self
            .run_checked(&self.workdir, args(&["status", "--porcelain", "-z", "-uall"]))
            .await?;
        let (added, removed) = parse_porcelain(&status.stdout);
        if added.is_empty() && removed.is_empty() && !concludes_merge {
            log::debug!("Working copy clean, nothing to commit");
            return Ok(None);
        }

        if !added.is_empty() {
            let mut add = args(&["add", "--"]);
            add.extend(added.iter().cloned());
            self.run_checked(&self.workdir, add).await?;
        }
        if !removed.is_empty() {
            let mut rm = args(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--"]);
            rm.extend(removed.iter().cloned());
            self.run_checked(&self.workdir, rm).await?;
        }

        let message = format!(
            "Sync from Kurumi - {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let mut commit = self.identity_args();
        commit.extend(args(&["commit", "--quiet", "-m", &message]));
        self.run_checked(&self.workdir, commit).await?;

        let head = self
            .run_checked(&self.workdir, args(&["rev-parse", "HEAD"]))
            .await?;
        let head = head.stdout.trim().to_string();
        log::info!(
            "Committed {} changed and {} removed files as {}",
            added.len(),
            removed.len(),
            head
        );
        Ok(Some(head))
    }

    /// Commit local changes and push the branch. Returns the new commit id
    /// if one was made.
    pub async fn push(&self, status: &StatusTracker, concludes_merge: bool) -> Result<Option<String>> {
        let commit = self.commit(concludes_merge).await?;
        let Some(head) = self.resolve("HEAD").await? else {
            return Ok(None);
        };
        // The store now holds everything up to HEAD.
        self.run_checked(&self.workdir, args(&["update-ref", SYNCED_REF, &head]))
            .await?;

        status.set_phase(SyncPhase::Pushing);
        let refspec = format!("HEAD:refs/heads/{}", self.settings.branch);
        self.run_checked(&self.workdir, vec!["push".into(), self.remote()?, refspec])
            .await?;
        log::info!("Pushed branch '{}'", self.settings.branch);
        Ok(commit)
    }

    /// Check that the remote is reachable with the configured token.
    pub async fn test_connection(&self) -> Result<()> {
        let dir = std::env::temp_dir();
        self.run_checked(&dir, vec!["ls-remote".into(), "--heads".into(), self.remote()?])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_porcelain() {
        let output = " M notes/a.md\0?? b.md\0 D old.md\0D  gone.md\0R  new.md\0orig.md\0";
        let (added, removed) = parse_porcelain(output);
        assert_eq!(added, vec!["notes/a.md", "b.md", "new.md"]);
        assert_eq!(removed, vec!["old.md", "gone.md"]);
        assert_eq!(parse_porcelain(""), (vec![], vec![]));
    }

    #[test]
    fn test_split_paths() {
        let paths = split_paths("a.md\0dir/b.md\0\0");
        assert_eq!(paths.into_iter().collect::<Vec<_>>(), vec!["a.md", "dir/b.md"]);
        assert!(split_paths("").is_empty());
    }

    #[test]
    fn test_only_reconcile_concludes_merge() {
        let reconcile = PullOutcome::NeedsReconcile {
            remote_files: BTreeMap::new(),
            base_sidecar: None,
        };
        assert!(reconcile.concludes_merge());
        assert!(!PullOutcome::UpToDate.concludes_merge());
        assert!(!PullOutcome::Fresh.concludes_merge());
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("push", "fatal: Authentication failed for 'https://github.com/a/b.git/'".into()),
            KurumiError::Auth(_)
        ));
        assert!(matches!(
            classify_failure(
                "fetch",
                "fatal: unable to access 'https://x/': The requested URL returned error: 403".into()
            ),
            KurumiError::Auth(_)
        ));
        assert!(matches!(
            classify_failure("fetch", "fatal: unable to access 'https://x/': Could not resolve host: x".into()),
            KurumiError::Network(_)
        ));
        assert!(matches!(
            classify_failure("push", "! [rejected] HEAD -> main (non-fast-forward)".into()),
            KurumiError::Git { ref command, .. } if command == "push"
        ));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = GitSettings::new("https://github.com/a/b", "t");
        assert_eq!(settings.branch, "main");
        assert_eq!(settings.author_name, "Kurumi");
        assert_eq!(settings.author_email, "kurumi@localhost");
    }
}
