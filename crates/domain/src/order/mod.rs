//! Order aggregate and its status axes.

mod aggregate;
mod state;

pub use aggregate::{Order, OrderDetails, OrderItem};
pub use state::{OrderStatus, PaymentStatus, ShippingStatus};
