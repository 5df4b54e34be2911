//! Tag and folder membership mutation on drafts.

use super::*;

/// Upserts a membership of `categorizer` into every draft.
///
/// Any existing membership of `kind` with the categorizer's id is removed before the categorizer
/// is appended, so applying the same categorizer twice leaves exactly one membership. Other
/// memberships are untouched.
pub fn apply_membership(
  mut drafts: Vec<PaperDraft>,
  categorizer: &Categorizer,
  kind: CategorizerKind,
) -> Vec<PaperDraft> {
  let membership = Categorizer { kind, ..categorizer.clone() };
  for draft in &mut drafts {
    let memberships = draft.memberships_mut(kind);
    memberships.retain(|existing| existing.id != categorizer.id);
    memberships.push(membership.clone());
  }
  drafts
}

/// Replaces every membership of `kind` with the single `categorizer`.
///
/// Used when importing straight into a categorizer; this is not a merge.
pub fn replace_membership(
  mut drafts: Vec<PaperDraft>,
  categorizer: &Categorizer,
  kind: CategorizerKind,
) -> Vec<PaperDraft> {
  let membership = Categorizer { kind, ..categorizer.clone() };
  for draft in &mut drafts {
    *draft.memberships_mut(kind) = vec![membership.clone()];
  }
  drafts
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_apply_membership_is_idempotent() {
    let tag = Categorizer::tag("gnn");
    let drafts = vec![PaperDraft::new("a"), PaperDraft::new("b")];

    let drafts = apply_membership(drafts, &tag, CategorizerKind::Tag);
    let drafts = apply_membership(drafts, &tag, CategorizerKind::Tag);

    for draft in &drafts {
      assert_eq!(draft.tags.iter().filter(|t| t.id == tag.id).count(), 1);
      assert!(draft.folders.is_empty());
    }
  }

  #[test]
  fn test_apply_membership_keeps_unrelated() {
    let mut draft = PaperDraft::new("a");
    let other = Categorizer::tag("other");
    let folder = Categorizer::folder("Reading");
    draft.tags.push(other.clone());
    draft.folders.push(folder.clone());

    let renamed = Categorizer { name: "gnn (renamed)".into(), ..Categorizer::tag("gnn") };
    let drafts = apply_membership(vec![draft], &renamed, CategorizerKind::Tag);

    assert_eq!(drafts[0].tags, vec![other, renamed]);
    assert_eq!(drafts[0].folders, vec![folder]);
  }

  #[test]
  fn test_apply_membership_updates_name_of_same_identity() {
    let tag = Categorizer::tag("old name");
    let drafts = apply_membership(vec![PaperDraft::new("a")], &tag, CategorizerKind::Tag);

    let renamed = Categorizer { name: "new name".into(), ..tag.clone() };
    let drafts = apply_membership(drafts, &renamed, CategorizerKind::Tag);

    assert_eq!(drafts[0].tags.len(), 1);
    assert_eq!(drafts[0].tags[0].name, "new name");
  }

  #[test]
  fn test_replace_membership_discards_existing() {
    let mut draft = PaperDraft::new("a");
    draft.tags.push(Categorizer::tag("one"));
    draft.tags.push(Categorizer::tag("two"));
    draft.folders.push(Categorizer::folder("kept"));

    let target = Categorizer::tag("target");
    let drafts = replace_membership(vec![draft], &target, CategorizerKind::Tag);

    assert_eq!(drafts[0].tags, vec![target]);
    assert_eq!(drafts[0].folders.len(), 1);
  }

  #[test]
  fn test_membership_kind_follows_argument() {
    let folder = Categorizer::folder("Reading");
    let drafts = apply_membership(vec![PaperDraft::new("a")], &folder, CategorizerKind::Tag);
    assert_eq!(drafts[0].tags[0].kind, CategorizerKind::Tag);
    assert!(drafts[0].folders.is_empty());
  }
}
