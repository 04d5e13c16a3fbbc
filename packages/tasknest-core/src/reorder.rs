/// Dense ordering of sibling items.
///
/// Every function here is pure. Sibling slices are taken in list order, which
/// callers keep equal to `order` order; results are re-numbered `0..n` in list
/// order. Out-of-range insertion indices are clamped, never rejected, since a
/// drag gesture can easily hover past either end of a list.
use crate::types::{Column, Comment, Task};

/// An item with a dense position inside a parent container.
pub trait OrderedItem: Clone {
    fn id(&self) -> &str;
    fn order(&self) -> usize;
    fn set_order(&mut self, order: usize);
    /// Id of the owning container.
    fn parent_id(&self) -> &str;
    fn set_parent_id(&mut self, parent_id: &str);
}

impl OrderedItem for Column {
    fn id(&self) -> &str {
        &self.id
    }
    fn order(&self) -> usize {
        self.order
    }
    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
    fn parent_id(&self) -> &str {
        &self.board_id
    }
    fn set_parent_id(&mut self, parent_id: &str) {
        self.board_id = parent_id.to_string();
    }
}

impl OrderedItem for Task {
    fn id(&self) -> &str {
        &self.id
    }
    fn order(&self) -> usize {
        self.order
    }
    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
    fn parent_id(&self) -> &str {
        &self.column_id
    }
    fn set_parent_id(&mut self, parent_id: &str) {
        self.column_id = parent_id.to_string();
    }
}

impl OrderedItem for Comment {
    fn id(&self) -> &str {
        &self.id
    }
    fn order(&self) -> usize {
        self.order
    }
    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
    fn parent_id(&self) -> &str {
        &self.task_id
    }
    fn set_parent_id(&mut self, parent_id: &str) {
        self.task_id = parent_id.to_string();
    }
}

/// Clamp a requested insertion index into `0..=max`.
pub fn clamp_index(requested: i64, max: usize) -> usize {
    if requested <= 0 {
        0
    } else {
        usize::try_from(requested).map_or(max, |idx| idx.min(max))
    }
}

/// Sort by `order`, keeping the incoming sequence for ties.
pub fn sort_by_order<T: OrderedItem>(items: &mut [T]) {
    items.sort_by_key(|item| item.order());
}

/// Assign `order = position` to every item.
pub fn renumber<T: OrderedItem>(items: &mut [T]) {
    for (idx, item) in items.iter_mut().enumerate() {
        item.set_order(idx);
    }
}

/// True when the `order` values are exactly `{0, .., n-1}`.
pub fn is_dense<T: OrderedItem>(items: &[T]) -> bool {
    let mut seen = vec![false; items.len()];
    for item in items {
        match seen.get_mut(item.order()) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Sort and re-densify a possibly damaged sibling list.
/// Returns true if any `order` value changed.
pub fn repair<T: OrderedItem>(items: &mut [T]) -> bool {
    sort_by_order(items);
    let mut changed = false;
    for (idx, item) in items.iter_mut().enumerate() {
        if item.order() != idx {
            item.set_order(idx);
            changed = true;
        }
    }
    changed
}

/// Remove `item_id` and re-number the remainder.
/// Returns `None` if the item is not in `siblings`.
pub fn remove_item<T: OrderedItem>(siblings: &[T], item_id: &str) -> Option<(T, Vec<T>)> {
    let pos = siblings.iter().position(|s| s.id() == item_id)?;
    let mut rest = siblings.to_vec();
    let removed = rest.remove(pos);
    renumber(&mut rest);
    Some((removed, rest))
}

/// Move an item inside its own container.
///
/// The item is lifted out, then reinserted at `requested` clamped to the
/// length of the remaining list, so the last slot is always reachable.
/// Moving an item to its current index yields an equal list.
pub fn move_within<T: OrderedItem>(siblings: &[T], item_id: &str, requested: i64) -> Option<Vec<T>> {
    let (item, mut rest) = remove_item(siblings, item_id)?;
    let idx = clamp_index(requested, rest.len());
    rest.insert(idx, item);
    renumber(&mut rest);
    Some(rest)
}

/// Move an item from `source` into `destination`, reparenting it to
/// `destination_id`. Returns the new `(source, destination)` lists.
///
/// `requested` is clamped to `0..=destination.len()`.
pub fn move_across<T: OrderedItem>(
    source: &[T],
    destination: &[T],
    item_id: &str,
    destination_id: &str,
    requested: i64,
) -> Option<(Vec<T>, Vec<T>)> {
    let (mut item, rest) = remove_item(source, item_id)?;
    item.set_parent_id(destination_id);

    let mut dest: Vec<T> = destination
        .iter()
        .filter(|d| d.id() != item_id)
        .cloned()
        .collect();
    let idx = clamp_index(requested, dest.len());
    dest.insert(idx, item);
    renumber(&mut dest);
    Some((rest, dest))
}
