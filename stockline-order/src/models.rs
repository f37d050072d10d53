use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Declares a lower-case, string-backed status enum with `as_str`,
/// `Display` and `FromStr`, matching what the store persists.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
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
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

string_enum! {
    /// Order status in the lifecycle
    OrderStatus {
        Pending => "pending",
        Processing => "processing",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

string_enum! {
    PaymentStatus {
        Pending => "pending",
        Partial => "partial",
        Paid => "paid",
    }
}

string_enum! {
    /// How the customer settles the order
    PaymentType {
        Cash => "cash",
        Credit => "credit",
        Cheque => "cheque",
    }
}

string_enum! {
    /// How an individual payment was received
    PaymentMethod {
        Cash => "cash",
        Cheque => "cheque",
        BankTransfer => "bank_transfer",
    }
}

string_enum! {
    DeliveryStatus {
        Scheduled => "scheduled",
        InTransit => "in_transit",
        Delivered => "delivered",
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub sales_rep_id: String,
    pub order_date: DateTime<Utc>,
    pub delivery_date: Option<NaiveDate>,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    /// `total_amount` less anything returned.
    pub final_amount: Decimal,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Append a line to the free-text notes.
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        });
    }
}

/// One (product, batch) line. A FEFO split shows up as sibling items for the
/// same product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: String,
    pub order_id: String,
    pub line_no: i32,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
    /// Copied from the batch at allocation time.
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub received_by: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReturn {
    pub return_id: String,
    pub order_id: String,
    pub processed_by: String,
    pub reason: String,
    pub total_return_amount: Decimal,
    pub returned_at: DateTime<Utc>,
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnItem {
    pub return_item_id: String,
    pub return_id: String,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_id: String,
    pub order_id: String,
    pub vehicle_id: Option<String>,
    pub status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// The slice of a customer record fulfillment touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    /// Running amount owed on credit orders; never below zero.
    pub credit_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub registration: String,
    pub is_available: bool,
}

/// An order with everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub order_return: Option<OrderReturn>,
    pub delivery: Option<Delivery>,
}

impl OrderDetail {
    pub fn total_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }
}
