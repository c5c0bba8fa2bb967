//! gix-backed ref, rev-parse, and ancestry operations.

use gix::refs::transaction::{Change, LogChange, PreviousValue, RefEdit as GixRefEdit, RefLog};
use gix::refs::Target;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::*;

fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

fn from_gix_oid(oid: gix::ObjectId) -> GitOid {
    let bytes: [u8; 20] = oid.as_bytes().try_into().expect("SHA1 is 20 bytes");
    GitOid::from_bytes(bytes)
}

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(mut reference)) => {
            let id = reference
                .peel_to_id_in_place()
                .map_err(|e| GitError::BackendError {
                    message: format!("failed to peel ref '{name}': {e}"),
                })?;
            Ok(Some(from_gix_oid(id.detach())))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::BackendError {
            message: format!("failed to read ref '{name}': {e}"),
        }),
    }
}

pub fn write_ref(
    repo: &GixRepo,
    name: &RefName,
    oid: GitOid,
    log_message: &str,
) -> Result<(), GitError> {
    repo.repo
        .reference(name.as_str(), to_gix_oid(oid), PreviousValue::Any, log_message)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write ref '{name}': {e}"),
        })?;
    Ok(())
}

pub fn delete_ref(repo: &GixRepo, name: &RefName) -> Result<(), GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(reference)) => {
            reference.delete().map_err(|e| GitError::BackendError {
                message: format!("failed to delete ref '{name}': {e}"),
            })?;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(GitError::BackendError {
            message: format!("failed to look up ref '{name}' for deletion: {e}"),
        }),
    }
}

pub fn atomic_ref_update(repo: &GixRepo, edits: &[RefEdit]) -> Result<(), GitError> {
    let gix_edits: Vec<GixRefEdit> = edits
        .iter()
        .map(|edit| {
            let expected = match edit.expected_old_oid {
                Some(oid) if !oid.is_zero() => PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(oid))),
                Some(_) => PreviousValue::MustNotExist,
                None => PreviousValue::Any,
            };
            GixRefEdit {
                change: Change::Update {
                    log: LogChange {
                        mode: RefLog::AndReference,
                        force_create_reflog: false,
                        message: "atomic ref update".into(),
                    },
                    expected,
                    new: Target::Object(to_gix_oid(edit.new_oid)),
                },
                name: edit.name.as_str().try_into().map_err(|e| GitError::InvalidOid {
                    value: edit.name.as_str().to_string(),
                    reason: format!("invalid ref name: {e}"),
                })?,
                deref: false,
            }
        })
        .collect::<Result<Vec<_>, GitError>>()?;

    repo.repo
        .edit_references(gix_edits)
        .map_err(|e| GitError::RefConflict {
            ref_name: edits
                .first()
                .map(|e| e.name.as_str().to_string())
                .unwrap_or_default(),
            message: e.to_string(),
        })?;

    Ok(())
}

pub fn list_refs(repo: &GixRepo, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
    let platform = repo.repo.references().map_err(|e| GitError::BackendError {
        message: format!("failed to iterate refs: {e}"),
    })?;

    let iter = platform
        .prefixed(prefix)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to filter refs by prefix '{prefix}': {e}"),
        })?;

    let mut out = Vec::new();
    for reference in iter {
        let mut reference = reference.map_err(|e| GitError::BackendError {
            message: format!("failed to decode ref: {e}"),
        })?;
        let name = reference.name().as_bstr().to_string();
        let id = reference
            .peel_to_id_in_place()
            .map_err(|e| GitError::BackendError {
                message: format!("failed to peel ref '{name}': {e}"),
            })?;
        let ref_name = RefName::new(name).map_err(|e| GitError::InvalidOid {
            value: String::new(),
            reason: format!("invalid ref name returned by backend: {e}"),
        })?;
        out.push((ref_name, from_gix_oid(id.detach())));
    }
    out.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Ok(out)
}

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    rev_parse_opt(repo, spec)?.ok_or_else(|| GitError::NotFound {
        message: format!("revspec '{spec}' did not resolve to an object"),
    })
}

pub fn rev_parse_opt(repo: &GixRepo, spec: &str) -> Result<Option<GitOid>, GitError> {
    match repo.repo.rev_parse_single(spec) {
        Ok(id) => Ok(Some(from_gix_oid(id.detach()))),
        Err(gix::revision::spec::parse::Error::InvalidRevision(_)) => Ok(None),
        Err(e) => {
            if e.to_string().contains("not found") || e.to_string().contains("unknown revision") {
                Ok(None)
            } else {
                Err(GitError::BackendError {
                    message: format!("failed to resolve revspec '{spec}': {e}"),
                })
            }
        }
    }
}

pub fn is_ancestor(repo: &GixRepo, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
    let base = merge_base(repo, ancestor, descendant)?;
    Ok(base == Some(ancestor))
}

pub fn merge_base(repo: &GixRepo, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError> {
    let a_commit = repo
        .repo
        .find_commit(to_gix_oid(a))
        .map_err(|e| GitError::NotFound {
            message: format!("commit {a}: {e}"),
        })?;
    let b_id = to_gix_oid(b);

    let base = repo
        .repo
        .merge_base(a_commit.id(), b_id)
        .map_err(|e| {
            if e.to_string().contains("not found") || e.to_string().contains("no merge base") {
                None::<GitError>
            } else {
                Some(GitError::BackendError {
                    message: format!("failed to compute merge-base({a}, {b}): {e}"),
                })
            }
        });

    match base {
        Ok(id) => Ok(Some(from_gix_oid(id.detach()))),
        Err(Some(err)) => Err(err),
        Err(None) => Ok(None),
    }
}
