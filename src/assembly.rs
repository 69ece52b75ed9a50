//! Order assembly: turns a requested cart tree into priced lines.
//!
//! Assembly is pure. It reads a catalog snapshot and returns the flattened
//! lines, the grand total and the stock debits to apply; the caller owns every
//! write. Lines come out depth-first in request order with each parent before
//! its children, so `parent` always indexes an earlier line.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{PosError, PosResult};
use crate::models::{OrderItemRequest, Product};
use crate::money::Money;

/// Largest quantity accepted on a single line.
pub const MAX_QUANTITY: i64 = 9999;
/// Deepest combo nesting accepted (a root line is depth 0).
pub const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    /// Price snapshot taken from the catalog (0 for included children).
    pub unit_price: Money,
    pub note: Option<String>,
    /// Index of the parent line in `AssembledOrder::lines`.
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDebit {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledOrder {
    pub lines: Vec<AssembledLine>,
    pub total: Money,
    /// One debit per stock-tracked product, quantities summed across lines.
    pub debits: Vec<StockDebit>,
}

/// Every product id referenced anywhere in the tree.
pub fn collect_product_ids(items: &[OrderItemRequest]) -> BTreeSet<i64> {
    fn walk(items: &[OrderItemRequest], ids: &mut BTreeSet<i64>) {
        for item in items {
            ids.insert(item.product_id);
            walk(&item.children, ids);
        }
    }

    let mut ids = BTreeSet::new();
    walk(items, &mut ids);
    ids
}

/// Structural checks that need no catalog: non-empty cart, quantities in
/// range, bounded depth, `included` only on sub-items.
pub fn validate(items: &[OrderItemRequest]) -> PosResult<()> {
    fn walk(items: &[OrderItemRequest], depth: usize) -> PosResult<()> {
        if depth > MAX_DEPTH {
            return Err(PosError::invalid(format!(
                "combo nesting deeper than {} levels",
                MAX_DEPTH
            )));
        }
        for item in items {
            if item.quantity < 1 || item.quantity > MAX_QUANTITY {
                return Err(PosError::invalid(format!(
                    "quantity for product {} must be between 1 and {}, got {}",
                    item.product_id, MAX_QUANTITY, item.quantity
                )));
            }
            if depth == 0 && item.included {
                return Err(PosError::invalid(format!(
                    "product {} is marked included but has no parent line",
                    item.product_id
                )));
            }
            walk(&item.children, depth + 1)?;
        }
        Ok(())
    }

    if items.is_empty() {
        return Err(PosError::invalid("order must contain at least one item"));
    }
    walk(items, 0)
}

/// Prices and flattens the request tree against `catalog`.
pub fn assemble(
    items: &[OrderItemRequest],
    catalog: &HashMap<i64, Product>,
) -> PosResult<AssembledOrder> {
    validate(items)?;

    let mut lines = Vec::new();
    for item in items {
        flatten(item, None, catalog, &mut lines)?;
    }

    let total = lines
        .iter()
        .try_fold(Money::ZERO, |acc, line| {
            line.unit_price
                .checked_mul(line.quantity)
                .and_then(|subtotal| acc.checked_add(subtotal))
        })
        .ok_or_else(|| PosError::invalid("order total overflows"))?;

    let mut by_product: BTreeMap<i64, i64> = BTreeMap::new();
    for line in &lines {
        if catalog
            .get(&line.product_id)
            .is_some_and(|p| p.stock_tracked)
        {
            *by_product.entry(line.product_id).or_default() += line.quantity;
        }
    }
    let debits = by_product
        .into_iter()
        .map(|(product_id, quantity)| StockDebit {
            product_id,
            quantity,
        })
        .collect();

    Ok(AssembledOrder {
        lines,
        total,
        debits,
    })
}

fn flatten(
    item: &OrderItemRequest,
    parent: Option<usize>,
    catalog: &HashMap<i64, Product>,
    lines: &mut Vec<AssembledLine>,
) -> PosResult<()> {
    let product = catalog
        .get(&item.product_id)
        .ok_or(PosError::ProductNotFound(item.product_id))?;

    if !product.available {
        return Err(PosError::ProductUnavailable {
            product_id: product.id,
            name: product.name.clone(),
        });
    }

    let unit_price = if item.included {
        Money::ZERO
    } else {
        product.price
    };

    let index = lines.len();
    lines.push(AssembledLine {
        product_id: product.id,
        product_name: product.name.clone(),
        quantity: item.quantity,
        unit_price,
        note: item.note.clone(),
        parent,
    });

    for child in &item.children {
        flatten(child, Some(index), catalog, lines)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: i64, name: &str, price: Money, stock_tracked: bool) -> Product {
        Product {
            id,
            name: name.to_string(),
            price,
            cost: Money::ZERO,
            stock_tracked,
            stock: if stock_tracked { 10 } else { 0 },
            available: true,
            created_at: Utc::now(),
        }
    }

    fn catalog() -> HashMap<i64, Product> {
        [
            product(1, "Lunch Set", Money::new(25, 0), false),
            product(2, "Extra Cheese", Money::new(3, 0), true),
            product(3, "Fries", Money::new(4, 50), true),
            product(4, "Soup", Money::new(10, 0), false),
        ]
        .into_iter()
        .map(|p| (p.id, p))
        .collect()
    }

    #[test]
    fn test_flat_order_total() {
        let items = vec![OrderItemRequest::new(4, 2)];
        let order = assemble(&items, &catalog()).unwrap();

        assert_eq!(order.total, Money::new(20, 0));
        assert_eq!(order.lines.len(), 1);
        assert!(order.debits.is_empty(), "Soup does not track stock");
    }

    #[test]
    fn test_paid_child_adds_to_total() {
        let items = vec![OrderItemRequest::new(1, 1).with_child(OrderItemRequest::new(2, 1))];
        let order = assemble(&items, &catalog()).unwrap();

        assert_eq!(order.total, Money::new(28, 0));
        assert_eq!(order.lines[0].parent, None);
        assert_eq!(order.lines[1].parent, Some(0));
        assert_eq!(order.lines[1].unit_price, Money::new(3, 0));
    }

    #[test]
    fn test_included_child_is_priced_at_zero() {
        let items = vec![OrderItemRequest::new(1, 1)
            .with_child(OrderItemRequest::new(3, 1).included())
            .with_child(OrderItemRequest::new(2, 1))];
        let order = assemble(&items, &catalog()).unwrap();

        assert_eq!(order.total, Money::new(28, 0));
        assert_eq!(order.lines[1].unit_price, Money::ZERO);
        // Included children still consume stock
        assert!(order.debits.contains(&StockDebit { product_id: 3, quantity: 1 }));
    }

    #[test]
    fn test_depth_first_input_order() {
        let items = vec![
            OrderItemRequest::new(1, 1)
                .with_child(OrderItemRequest::new(2, 1).with_child(OrderItemRequest::new(3, 1)))
                .with_child(OrderItemRequest::new(4, 1)),
            OrderItemRequest::new(4, 3),
        ];
        let order = assemble(&items, &catalog()).unwrap();

        let ids: Vec<i64> = order.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 4]);
        let parents: Vec<Option<usize>> = order.lines.iter().map(|l| l.parent).collect();
        assert_eq!(parents, vec![None, Some(0), Some(1), Some(0), None]);
    }

    #[test]
    fn test_debits_are_summed_per_product() {
        let items = vec![
            OrderItemRequest::new(3, 2),
            OrderItemRequest::new(1, 1).with_child(OrderItemRequest::new(3, 1)),
        ];
        let order = assemble(&items, &catalog()).unwrap();

        assert_eq!(order.debits, vec![StockDebit { product_id: 3, quantity: 3 }]);
    }

    #[test]
    fn test_missing_nested_product() {
        let items = vec![OrderItemRequest::new(1, 1).with_child(OrderItemRequest::new(99, 1))];
        let err = assemble(&items, &catalog()).unwrap_err();
        assert!(matches!(err, PosError::ProductNotFound(99)));
    }

    #[test]
    fn test_unavailable_product_rejected() {
        let mut catalog = catalog();
        catalog.get_mut(&4).unwrap().available = false;

        let err = assemble(&[OrderItemRequest::new(4, 1)], &catalog).unwrap_err();
        assert!(matches!(err, PosError::ProductUnavailable { product_id: 4, .. }));
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let err = assemble(&[OrderItemRequest::new(4, 0)], &catalog()).unwrap_err();
        assert!(matches!(err, PosError::InvalidInput(_)));

        let nested = vec![OrderItemRequest::new(1, 1).with_child(OrderItemRequest::new(2, -1))];
        let err = assemble(&nested, &catalog()).unwrap_err();
        assert!(matches!(err, PosError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = assemble(&[], &catalog()).unwrap_err();
        assert!(matches!(err, PosError::InvalidInput(_)));
    }

    #[test]
    fn test_included_root_rejected() {
        let err = validate(&[OrderItemRequest::new(3, 1).included()]).unwrap_err();
        assert!(matches!(err, PosError::InvalidInput(_)));
    }

    #[test]
    fn test_nesting_limit() {
        let mut item = OrderItemRequest::new(4, 1);
        for _ in 0..=MAX_DEPTH {
            item = OrderItemRequest::new(4, 1).with_child(item);
        }
        assert!(matches!(validate(&[item]), Err(PosError::InvalidInput(_))));
    }

    #[test]
    fn test_collect_product_ids_includes_nested() {
        let items = vec![
            OrderItemRequest::new(1, 1).with_child(OrderItemRequest::new(2, 1)),
            OrderItemRequest::new(4, 1),
        ];
        let ids: Vec<i64> = collect_product_ids(&items).into_iter().collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }
}
