use crate::{api::ApiContext, ContextRow, SkinId};
use std::cmp::Ordering;

/// Sort key used for contexts without an explicit order.
pub const UNORDERED_SORT_KEY: i64 = 999;

/// Map an API context record into a [`ContextRow`].
///
/// Field priority:
/// - name: `name`, then `display_name`, then `handle`, then `"Context {id}"`
/// - skin: `skinId`, then `skin_id`, then `simple` (unknown values map to
///   `simple`)
/// - order: `order`, then `sort_order`
///
/// Rows coming from the API are always live: not archived, not deleted.
#[must_use]
pub fn normalize_context(context: &ApiContext) -> ContextRow {
    let name = context
        .name
        .clone()
        .or_else(|| context.display_name.clone())
        .or_else(|| context.handle.clone())
        .unwrap_or_else(|| format!("Context {}", context.id));

    let skin_id = context
        .skin_id_camel
        .as_deref()
        .or(context.skin_id.as_deref())
        .map(SkinId::parse_lossy)
        .unwrap_or_default();

    ContextRow {
        order: context.order.or(context.sort_order),
        ..ContextRow::new(context.id, name, skin_id)
    }
}

/// Normalize a list of API contexts and sort it by order. The sort is stable,
/// so rows with equal keys keep the order the API returned.
#[must_use]
pub fn normalize_contexts(contexts: &[ApiContext]) -> Vec<ContextRow> {
    let mut rows: Vec<ContextRow> = contexts.iter().map(normalize_context).collect();
    rows.sort_by(compare_by_order);
    rows
}

/// The sort key of a context, with missing orders last.
#[must_use]
pub fn sort_key(row: &ContextRow) -> i64 {
    row.order.unwrap_or(UNORDERED_SORT_KEY)
}

pub fn compare_by_order(a: &ContextRow, b: &ContextRow) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}
