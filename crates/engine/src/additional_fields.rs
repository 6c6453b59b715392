//! Structural operations over additional-fields trees.
//!
//! Each operation takes the tree by value and returns the updated tree, so callers keep
//! their previous snapshot when they need undo or change detection. Deep traversal is
//! pre-order structural recursion that records an explicit [`FieldPath`] breadcrumb, which
//! lets an editor splice a nested edit back without rebuilding unrelated branches.

use std::fmt;

use portal_types::{AdditionalFields, FieldRecord};
use tracing::debug;

/// One step from a tree to a record inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Key of the child list.
    pub option_value: String,
    /// Position within the child list.
    pub index: usize,
}

/// Breadcrumb from a tree root down to a nested record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Nesting depth, 1 for direct children of the root tree.
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|segment| format!("{}[{}]", segment.option_value, segment.index))
            .collect();
        f.write_str(&rendered.join(" > "))
    }
}

/// A record located by [`find_deep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch<'tree> {
    pub field: &'tree FieldRecord,
    pub path: FieldPath,
}

/// Child list for `option_value`, empty when the key is absent.
pub fn get<'tree>(tree: &'tree AdditionalFields, option_value: &str) -> &'tree [FieldRecord] {
    tree.get(option_value)
}

/// Appends `field` under `option_value`, or replaces the child with the same id in place.
pub fn upsert_child(mut tree: AdditionalFields, option_value: &str, field: FieldRecord) -> AdditionalFields {
    let children = tree.children_mut(option_value);
    match children.iter().position(|child| child.id == field.id) {
        Some(index) => children[index] = field,
        None => children.push(field),
    }
    tree
}

/// Removes the child with `field_id` from `option_value`. The key stays even when its list
/// becomes empty.
pub fn remove_child(mut tree: AdditionalFields, option_value: &str, field_id: &str) -> AdditionalFields {
    if tree.contains_key(option_value) {
        tree.children_mut(option_value).retain(|child| child.id != field_id);
    }
    tree
}

/// Moves the child at `from_index` to `to_index` within `option_value`.
///
/// Other keys are untouched. An out-of-range source leaves the tree unchanged; the
/// destination is clamped to the last position.
pub fn reorder(mut tree: AdditionalFields, option_value: &str, from_index: usize, to_index: usize) -> AdditionalFields {
    if !tree.contains_key(option_value) {
        debug!(option_value, "reorder skipped: unknown option value");
        return tree;
    }
    {
        let children = tree.children_mut(option_value);
        if from_index < children.len() {
            let destination = to_index.min(children.len() - 1);
            let moved = children.remove(from_index);
            children.insert(destination, moved);
        } else {
            debug!(option_value, from_index, length = children.len(), "reorder skipped: source index out of range");
        }
    }
    tree
}

/// Appends a freshly defaulted field under `option_value` and returns its id.
pub fn add_additional_field(tree: AdditionalFields, option_value: &str) -> (AdditionalFields, String) {
    let field = FieldRecord::default();
    let field_id = field.id.clone();
    (upsert_child(tree, option_value, field), field_id)
}

/// Searches every key and every nested tree for `field_id`.
pub fn find_deep<'tree>(tree: &'tree AdditionalFields, field_id: &str) -> Option<FieldMatch<'tree>> {
    let mut breadcrumb = Vec::new();
    let field = find_with_breadcrumb(tree, field_id, &mut breadcrumb)?;
    Some(FieldMatch {
        field,
        path: FieldPath(breadcrumb),
    })
}

fn find_with_breadcrumb<'tree>(
    tree: &'tree AdditionalFields,
    field_id: &str,
    breadcrumb: &mut Vec<PathSegment>,
) -> Option<&'tree FieldRecord> {
    for (option_value, children) in tree.iter() {
        for (index, child) in children.iter().enumerate() {
            breadcrumb.push(PathSegment {
                option_value: option_value.clone(),
                index,
            });
            if child.id == field_id {
                return Some(child);
            }
            if let Some(found) = find_with_breadcrumb(&child.additional_fields, field_id, breadcrumb) {
                return Some(found);
            }
            breadcrumb.pop();
        }
    }
    None
}

/// Follows a breadcrumb produced by [`find_deep`].
pub fn field_at<'tree>(tree: &'tree AdditionalFields, path: &FieldPath) -> Option<&'tree FieldRecord> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = tree.get(&first.option_value).get(first.index)?;
    for segment in rest {
        current = current.additional_fields.get(&segment.option_value).get(segment.index)?;
    }
    Some(current)
}

/// Replaces the first record (pre-order) whose id matches `field.id`.
///
/// A match inside a nested child's tree rewrites only that child's `additional_fields`;
/// siblings are left as they were. Returns false when no record matched.
pub fn replace_deep(mut tree: AdditionalFields, field: FieldRecord) -> (AdditionalFields, bool) {
    let mut replacement = Some(field);
    let replaced = replace_first(&mut tree, &mut replacement);
    (tree, replaced)
}

/// Replaces the record with `field.id` anywhere in the tree, or appends it under
/// `option_value` when it is not present yet.
pub fn upsert_deep(tree: AdditionalFields, option_value: &str, field: FieldRecord) -> AdditionalFields {
    if find_deep(&tree, &field.id).is_some() {
        return replace_deep(tree, field).0;
    }
    upsert_child(tree, option_value, field)
}

fn replace_first(tree: &mut AdditionalFields, replacement: &mut Option<FieldRecord>) -> bool {
    for (_, children) in tree.iter_mut() {
        for child in children.iter_mut() {
            if let Some(field) = replacement.take_if(|field| field.id == child.id) {
                *child = field;
                return true;
            }
            if replace_first(&mut child.additional_fields, replacement) {
                return true;
            }
        }
    }
    false
}

/// Removes the first record (pre-order) with `field_id`, returning it with the updated tree.
pub fn remove_deep(mut tree: AdditionalFields, field_id: &str) -> (AdditionalFields, Option<FieldRecord>) {
    let removed = remove_first(&mut tree, field_id);
    (tree, removed)
}

fn remove_first(tree: &mut AdditionalFields, field_id: &str) -> Option<FieldRecord> {
    for (_, children) in tree.iter_mut() {
        if let Some(index) = children.iter().position(|child| child.id == field_id) {
            return Some(children.remove(index));
        }
        for child in children.iter_mut() {
            if let Some(removed) = remove_first(&mut child.additional_fields, field_id) {
                return Some(removed);
            }
        }
    }
    None
}

/// Splices an edited record back into a top-level list by id (last writer wins).
///
/// Top-level ids are checked first, then every nested tree in list order.
pub fn splice_field(mut fields: Vec<FieldRecord>, updated: FieldRecord) -> (Vec<FieldRecord>, bool) {
    if let Some(index) = fields.iter().position(|field| field.id == updated.id) {
        fields[index] = updated;
        return (fields, true);
    }
    let mut replacement = Some(updated);
    for field in fields.iter_mut() {
        if replace_first(&mut field.additional_fields, &mut replacement) {
            return (fields, true);
        }
    }
    (fields, false)
}

/// Finds a record by id in a top-level list or any nested tree.
pub fn find_in_list<'list>(fields: &'list [FieldRecord], field_id: &str) -> Option<&'list FieldRecord> {
    fields.iter().find_map(|field| {
        if field.id == field_id {
            Some(field)
        } else {
            find_deep(&field.additional_fields, field_id).map(|found| found.field)
        }
    })
}

/// Every record of a list in pre-order, nested trees included.
pub fn flatten_fields(fields: &[FieldRecord]) -> Vec<&FieldRecord> {
    let mut flattened = Vec::new();
    for field in fields {
        collect_pre_order(field, &mut flattened);
    }
    flattened
}

fn collect_pre_order<'list>(field: &'list FieldRecord, flattened: &mut Vec<&'list FieldRecord>) {
    flattened.push(field);
    for (_, children) in field.additional_fields.iter() {
        for child in children {
            collect_pre_order(child, flattened);
        }
    }
}

/// Tree keys of `field` that match none of its current option values.
///
/// Fields without enumerable options report nothing.
pub fn stale_keys(field: &FieldRecord) -> Vec<String> {
    if !field.has_enumerable_options() {
        return Vec::new();
    }
    let values = field.enumerable_values();
    field
        .additional_fields
        .keys()
        .filter(|key| !values.contains(key.as_str()))
        .cloned()
        .collect()
}

/// Drops every key reported by [`stale_keys`] together with its child list.
pub fn prune_stale_keys(mut field: FieldRecord) -> FieldRecord {
    for key in stale_keys(&field) {
        debug!(field_id = %field.id, option_value = %key, "pruning stale additional-fields key");
        field.additional_fields.remove_key(&key);
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::{FieldType, parse_options_text};
    use proptest::prelude::*;

    fn field(id: &str) -> FieldRecord {
        FieldRecord {
            id: id.to_string(),
            ..FieldRecord::new(FieldType::Text)
        }
    }

    fn ids(children: &[FieldRecord]) -> Vec<&str> {
        children.iter().map(|child| child.id.as_str()).collect()
    }

    #[test]
    fn upsert_appends_then_replaces_in_place() {
        let tree = upsert_child(AdditionalFields::new(), "Yes", field("a"));
        let tree = upsert_child(tree, "Yes", field("b"));
        let mut renamed = field("a");
        renamed.label = "Renamed".into();
        let tree = upsert_child(tree, "Yes", renamed);
        assert_eq!(ids(get(&tree, "Yes")), vec!["a", "b"]);
        assert_eq!(get(&tree, "Yes")[0].label, "Renamed");
    }

    #[test]
    fn remove_keeps_empty_key() {
        let tree = upsert_child(AdditionalFields::new(), "Yes", field("a"));
        let tree = remove_child(tree, "Yes", "a");
        assert!(tree.contains_key("Yes"));
        assert!(get(&tree, "Yes").is_empty());
        let untouched = remove_child(tree, "No", "a");
        assert!(!untouched.contains_key("No"));
    }

    #[test]
    fn remove_then_upsert_round_trips() {
        let tree = ["a", "b", "c"]
            .into_iter()
            .fold(AdditionalFields::new(), |tree, id| upsert_child(tree, "Yes", field(id)));
        let original = get(&tree, "Yes").to_vec();
        let restored = upsert_child(remove_child(tree.clone(), "Yes", "c"), "Yes", field("c"));
        assert_eq!(get(&restored, "Yes"), original.as_slice());
    }

    #[test]
    fn reorder_moves_and_clamps() {
        let mut tree = ["a", "b", "c"]
            .into_iter()
            .fold(AdditionalFields::new(), |tree, id| upsert_child(tree, "Yes", field(id)));
        tree = upsert_child(tree, "No", field("z"));
        let tree = reorder(tree, "Yes", 0, 99);
        assert_eq!(ids(get(&tree, "Yes")), vec!["b", "c", "a"]);
        let tree = reorder(tree, "Yes", 7, 0);
        assert_eq!(ids(get(&tree, "Yes")), vec!["b", "c", "a"]);
        assert_eq!(ids(get(&tree, "No")), vec!["z"]);
    }

    #[test]
    fn deep_search_reports_breadcrumb() {
        let mut grandchild_parent = field("child");
        grandchild_parent.additional_fields = upsert_child(AdditionalFields::new(), "Other", field("grandchild"));
        let tree = upsert_child(AdditionalFields::new(), "Yes", field("sibling"));
        let tree = upsert_child(tree, "Yes", grandchild_parent);

        let found = find_deep(&tree, "grandchild").expect("grandchild located");
        assert_eq!(found.path.depth(), 2);
        assert_eq!(found.path.to_string(), "Yes[1] > Other[0]");
        assert_eq!(field_at(&tree, &found.path).map(|field| field.id.as_str()), Some("grandchild"));
        assert!(find_deep(&tree, "missing").is_none());
    }

    #[test]
    fn replace_deep_rewrites_only_the_nested_branch() {
        let mut parent = field("child");
        parent.additional_fields = upsert_child(AdditionalFields::new(), "Other", field("grandchild"));
        let tree = upsert_child(AdditionalFields::new(), "Yes", field("sibling"));
        let tree = upsert_child(tree, "Yes", parent);

        let mut edited = field("grandchild");
        edited.label = "Edited".into();
        let (tree, replaced) = replace_deep(tree, edited);
        assert!(replaced);
        let found = find_deep(&tree, "grandchild").expect("still present");
        assert_eq!(found.field.label, "Edited");
        assert_eq!(get(&tree, "Yes")[0], field("sibling"));

        let (_, replaced) = replace_deep(tree, field("unknown"));
        assert!(!replaced);
    }

    #[test]
    fn upsert_deep_inserts_when_absent() {
        let tree = upsert_deep(AdditionalFields::new(), "Yes", field("a"));
        assert_eq!(ids(get(&tree, "Yes")), vec!["a"]);
    }

    #[test]
    fn remove_deep_detaches_nested_record() {
        let mut parent = field("child");
        parent.additional_fields = upsert_child(AdditionalFields::new(), "Other", field("grandchild"));
        let tree = upsert_child(AdditionalFields::new(), "Yes", parent);
        let (tree, removed) = remove_deep(tree, "grandchild");
        assert_eq!(removed.map(|field| field.id), Some("grandchild".to_string()));
        assert!(find_deep(&tree, "grandchild").is_none());
        assert!(find_deep(&tree, "child").is_some());
    }

    #[test]
    fn splice_field_prefers_top_level_then_nested() {
        let mut parent = field("parent");
        parent.additional_fields = upsert_child(AdditionalFields::new(), "Yes", field("nested"));
        let fields = vec![parent, field("plain")];

        let mut nested = field("nested");
        nested.required = true;
        let (fields, replaced) = splice_field(fields, nested);
        assert!(replaced);
        assert!(find_in_list(&fields, "nested").expect("nested").required);
        assert_eq!(flatten_fields(&fields).len(), 3);
    }

    #[test]
    fn stale_keys_follow_current_options() {
        let mut parent = FieldRecord::new(FieldType::Select);
        if let Some(config) = parent.options_config_mut() {
            config.options = parse_options_text("Yes;No");
        }
        parent.additional_fields = upsert_child(AdditionalFields::new(), "Yes", field("a"));
        parent.additional_fields = upsert_child(parent.additional_fields, "Maybe", field("b"));
        assert_eq!(stale_keys(&parent), vec!["Maybe".to_string()]);
        let pruned = prune_stale_keys(parent);
        assert!(!pruned.additional_fields.contains_key("Maybe"));
        assert!(pruned.additional_fields.contains_key("Yes"));
    }

    proptest! {
        #[test]
        fn reorder_permutes_only_the_target_list(
            length in 0usize..6,
            from_index in 0usize..8,
            to_index in 0usize..8,
        ) {
            let mut tree = upsert_child(AdditionalFields::new(), "No", field("other"));
            for index in 0..length {
                tree = upsert_child(tree, "Yes", field(&format!("child-{index}")));
            }
            let before: Vec<String> = ids(get(&tree, "Yes")).into_iter().map(str::to_string).collect();

            let reordered = reorder(tree.clone(), "Yes", from_index, to_index);
            let keys: Vec<&String> = reordered.keys().collect();
            prop_assert_eq!(keys, tree.keys().collect::<Vec<_>>());
            prop_assert_eq!(get(&reordered, "No"), get(&tree, "No"));

            let mut after: Vec<String> = ids(get(&reordered, "Yes")).into_iter().map(str::to_string).collect();
            if from_index < length {
                prop_assert_eq!(&after[to_index.min(length - 1)], &before[from_index]);
            } else {
                prop_assert_eq!(&after, &before);
            }
            after.sort();
            let mut sorted_before = before.clone();
            sorted_before.sort();
            prop_assert_eq!(after, sorted_before);
        }
    }
}
