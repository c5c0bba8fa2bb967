//! History walker: per-path blob history with author/committer filters, and
//! back-number lookup.
//!
//! Commits are walked via first-parent ancestry from `HEAD`. This is a
//! simplification over full topological history for repositories with
//! merge commits, but matches how every commit this crate itself produces
//! is created (single-parent, except merge-driver commits which carry
//! `[ours, theirs]` — walking `ours` first keeps local-history semantics).

use gitddb_git::{GitOid, GitRepo};

use crate::error::GitDdbError;
use crate::reader::Reader;

/// A conjunctive identity filter over a commit's author/committer fields.
/// Absent fields are wildcards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitFilter {
    /// Required author name, if any.
    pub author_name: Option<String>,
    /// Required author email, if any.
    pub author_email: Option<String>,
    /// Required committer name, if any.
    pub committer_name: Option<String>,
    /// Required committer email, if any.
    pub committer_email: Option<String>,
}

impl CommitFilter {
    fn matches(&self, author: &str, committer: &str) -> bool {
        identity_matches(author, self.author_name.as_deref(), self.author_email.as_deref())
            && identity_matches(committer, self.committer_name.as_deref(), self.committer_email.as_deref())
    }
}

/// Parse a `"Name <email>"` identity string into `(name, email)`.
pub(crate) fn parse_identity(identity: &str) -> (&str, &str) {
    match identity.split_once(" <") {
        Some((name, rest)) => (name, rest.trim_end_matches('>')),
        None => (identity, ""),
    }
}

fn identity_matches(identity: &str, name: Option<&str>, email: Option<&str>) -> bool {
    if name.is_none() && email.is_none() {
        return true;
    }
    let (actual_name, actual_email) = parse_identity(identity);
    name.is_none_or(|n| n == actual_name) && email.is_none_or(|e| e == actual_email)
}

/// Walk first-parent history from `head`, yielding `(commit_oid, CommitInfo)`
/// pairs in reverse-chronological order (newest first, matching HEAD).
///
/// # Errors
/// Returns [`GitDdbError::Git`] on a commit-read failure.
fn walk_commits(repo: &dyn GitRepo, head: GitOid) -> Result<Vec<(GitOid, gitddb_git::CommitInfo)>, GitDdbError> {
    let mut out = Vec::new();
    let mut current = Some(head);
    while let Some(oid) = current {
        let commit = repo.read_commit(oid)?;
        current = commit.parents.first().copied();
        out.push((oid, commit));
    }
    Ok(out)
}

/// Walk the history of `full_path`, collapsing consecutive duplicate blob
/// states (including consecutive "missing" states), and keeping only
/// commits that satisfy every filter in `filters` (an empty filter list
/// accepts every commit).
///
/// Returns `None` entries for commits where the path does not exist. If the
/// final collapsed history is a single `None` (the document never existed
/// on this line of history), returns an empty list instead.
///
/// # Errors
/// Returns [`GitDdbError::Git`] on a read failure.
pub fn get_history(
    repo: &dyn GitRepo,
    head: GitOid,
    full_path: &str,
    filters: &[CommitFilter],
) -> Result<Vec<Option<GitOid>>, GitDdbError> {
    let reader = Reader::new(repo);
    let commits = walk_commits(repo, head)?;

    let mut states = Vec::new();
    for (_oid, commit) in &commits {
        if !filters.is_empty() && !filters.iter().any(|f| f.matches(&commit.author, &commit.committer)) {
            continue;
        }
        let blob = reader.read_path(commit.tree_oid, full_path)?.map(|(oid, _)| oid);
        states.push(blob);
    }

    let mut collapsed: Vec<Option<GitOid>> = Vec::new();
    for state in states {
        if collapsed.last() != Some(&state) {
            collapsed.push(state);
        }
    }

    if collapsed.len() == 1 && collapsed[0].is_none() {
        return Ok(Vec::new());
    }
    Ok(collapsed)
}

/// Return the `(n+1)`-th distinct blob state going back from `HEAD`
/// (position 0 is the current `HEAD` blob), where "distinct" also counts
/// the transition to/from "deleted".
///
/// # Errors
/// Returns [`GitDdbError::InvalidBackNumber`] if `n` exceeds the number of
/// distinct states that exist, or [`GitDdbError::Git`] on a read failure.
pub fn get_back_number(
    repo: &dyn GitRepo,
    head: GitOid,
    full_path: &str,
    n: usize,
) -> Result<Option<GitOid>, GitDdbError> {
    let history = get_history(repo, head, full_path, &[])?;
    history.get(n).copied().ok_or_else(|| GitDdbError::InvalidBackNumber {
        id: full_path.to_owned(),
        requested: n,
        available: history.len(),
    })
}
