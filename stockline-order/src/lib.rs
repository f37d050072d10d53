pub mod models;
pub mod placement;
pub mod manager;
pub mod finance;
pub mod returns;

pub use models::{
    Customer, Delivery, DeliveryStatus, Order, OrderDetail, OrderItem, OrderReturn, OrderStatus, Payment,
    PaymentMethod, PaymentStatus, PaymentType, ReturnItem, Vehicle,
};
pub use placement::{OrderDraft, OrderLine};
pub use manager::{OrderError, OrderManager, Restock, TransitionPlan};
pub use finance::{FinancialManager, PaymentPlan};
pub use returns::{ReturnLine, ReturnPlan, ReturnProcessor};
