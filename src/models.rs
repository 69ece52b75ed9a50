use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// Declares an enum stored as an upper-case TEXT column.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(FulfillmentKind {
    DineIn => "DINE_IN",
    Takeaway => "TAKEAWAY",
    Delivery => "DELIVERY",
});

text_enum!(OrderStatus {
    Pending => "PENDING",
    Closed => "CLOSED",
    Cancelled => "CANCELLED",
});

text_enum!(PaymentMethod {
    Cash => "CASH",
    Wallet => "WALLET",
    Card => "CARD",
    CompanyCredit => "COMPANY_CREDIT",
});

text_enum!(MovementKind {
    In => "IN",
    Out => "OUT",
    Adjust => "ADJUST",
});

/// Identity of the user behind a request, supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: i64,
    pub role: String,
}

impl Caller {
    pub fn new(user_id: i64, role: impl Into<String>) -> Self {
        Caller {
            user_id,
            role: role.into(),
        }
    }
}

// ===== Catalog =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub cost: Money,
    pub stock_tracked: bool,
    pub stock: i64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Money,
    #[serde(default)]
    pub stock_tracked: bool,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_true")]
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: String,
    pub price: Money,
    pub cost: Money,
}

fn default_true() -> bool {
    true
}

// ===== Tables =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: i64,
    pub label: String,
    pub seats: i32,
    pub occupied: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTable {
    pub label: String,
    pub seats: i32,
}

// ===== Companies =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub legal_name: String,
    pub tax_id: String,
    pub has_credit: bool,
    pub credit_limit: Money,
    pub credit_used: Money,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn available_credit(&self) -> Money {
        if self.has_credit {
            self.credit_limit - self.credit_used
        } else {
            Money::ZERO
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompany {
    pub legal_name: String,
    pub tax_id: String,
    #[serde(default)]
    pub has_credit: bool,
    #[serde(default)]
    pub credit_limit: Money,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCreditLine {
    pub has_credit: bool,
    pub credit_limit: Money,
}

/// A repayment that frees part of a company's used credit.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCredit {
    pub amount: Money,
}

// ===== Orders =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub kind: FulfillmentKind,
    pub table_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub company_id: Option<i64>,
    pub is_credit: bool,
    pub status: OrderStatus,
    pub total: Money,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub note: Option<String>,
    pub parent_line_id: Option<i64>,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.unit_price.cents() * self.quantity)
    }
}

/// An order line together with the lines nested under it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineNode {
    #[serde(flatten)]
    pub line: OrderLine,
    pub children: Vec<OrderLineNode>,
}

impl OrderLineNode {
    /// Subtotal of this line and every line below it.
    pub fn tree_total(&self) -> Money {
        self.line.subtotal() + self.children.iter().map(OrderLineNode::tree_total).sum()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLineNode>,
    pub paid: Money,
}

impl OrderWithLines {
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLineNode::tree_total).sum()
    }

    pub fn outstanding(&self) -> Money {
        self.order.total - self.paid
    }
}

/// One requested cart entry; `children` are combo sub-items.
///
/// An `included` child is pre-priced into its parent: it is recorded at
/// price 0 and adds nothing to the total.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub included: bool,
    #[serde(default)]
    pub children: Vec<OrderItemRequest>,
}

impl OrderItemRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        OrderItemRequest {
            product_id,
            quantity,
            note: None,
            included: false,
            children: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn included(mut self) -> Self {
        self.included = true;
        self
    }

    pub fn with_child(mut self, child: OrderItemRequest) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub kind: FulfillmentKind,
    #[serde(default)]
    pub table_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub is_credit: bool,
    #[serde(default)]
    pub company_id: Option<i64>,
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrder {
    pub fn dine_in(table_id: i64, items: Vec<OrderItemRequest>) -> Self {
        CreateOrder {
            kind: FulfillmentKind::DineIn,
            table_id: Some(table_id),
            customer_id: None,
            is_credit: false,
            company_id: None,
            items,
        }
    }

    pub fn takeaway(items: Vec<OrderItemRequest>) -> Self {
        CreateOrder {
            kind: FulfillmentKind::Takeaway,
            table_id: None,
            customer_id: None,
            is_credit: false,
            company_id: None,
            items,
        }
    }

    pub fn on_credit(mut self, company_id: i64) -> Self {
        self.is_credit = true;
        self.company_id = Some(company_id);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrder {
    #[serde(default)]
    pub reason: Option<String>,
}

// ===== Payments & shifts =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub shift_id: i64,
    pub amount: Money,
    pub method: PaymentMethod,
    pub operation_code: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub order_id: i64,
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub operation_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CashShift {
    pub id: i64,
    pub cashier_id: i64,
    pub opening_float: Money,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub counted_amount: Option<Money>,
    pub notes: Option<String>,
    pub is_open: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenShift {
    pub opening_float: Money,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseShift {
    pub counted_amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub count: i64,
    pub amount: Money,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub shift: CashShift,
    pub totals: Vec<MethodTotal>,
    /// Money actually taken in; `COMPANY_CREDIT` settlements are excluded.
    pub total_collected: Money,
    /// Opening float plus cash taken during the shift.
    pub expected_cash: Money,
    /// Counted minus expected, once the shift is closed.
    pub difference: Option<Money>,
}

// ===== Inventory =====

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: i64,
    pub product_id: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    pub delta: i64,
    pub stock_after: i64,
    pub unit_cost: Money,
    pub reason: String,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Manual kardex entry. For `ADJUST`, `quantity` is the physically counted
/// stock level rather than a change.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdjustInventory {
    pub product_id: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub unit_cost: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockReconciliation {
    pub product_id: i64,
    pub stock: i64,
    pub ledger_stock: i64,
    pub consistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enum_round_trip() {
        assert_eq!(FulfillmentKind::DineIn.as_str(), "DINE_IN");
        assert_eq!("COMPANY_CREDIT".parse::<PaymentMethod>(), Ok(PaymentMethod::CompanyCredit));
        assert!("PAID".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_enum_json_matches_column_text() {
        let json = serde_json::to_string(&FulfillmentKind::Takeaway).unwrap();
        assert_eq!(json, "\"TAKEAWAY\"");
        let kind: MovementKind = serde_json::from_str("\"ADJUST\"").unwrap();
        assert_eq!(kind, MovementKind::Adjust);
    }

    #[test]
    fn test_order_item_request_defaults() {
        let item: OrderItemRequest =
            serde_json::from_str(r#"{"productId": 3, "quantity": 2}"#).unwrap();
        assert_eq!(item, OrderItemRequest::new(3, 2));
    }

    #[test]
    fn test_available_credit() {
        let mut company = Company {
            id: 1,
            legal_name: "Acme".to_string(),
            tax_id: "20123456789".to_string(),
            has_credit: true,
            credit_limit: Money::new(100, 0),
            credit_used: Money::new(90, 0),
            created_at: Utc::now(),
        };
        assert_eq!(company.available_credit(), Money::new(10, 0));

        company.has_credit = false;
        assert_eq!(company.available_credit(), Money::ZERO);
    }
}
