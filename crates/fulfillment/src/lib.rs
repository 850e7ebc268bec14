//! Order fulfillment core.
//!
//! The services in this crate are the only code that changes more than one
//! row at a time. Each public operation opens one unit of work on the store
//! and either commits all of its writes or none of them:
//!
//! - [`CartService`]: per-user cart with merge-on-add
//! - [`CheckoutService`]: cart to order, reserving stock per line
//! - [`CancellationService`]: pending order to cancelled, releasing stock
//! - [`PaymentService`]: payment attempts driving the order's payment status
//! - [`OrderQueries`]: order reads and administrative status edits

pub mod cancellation;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod queries;

pub use cancellation::CancellationService;
pub use cart::CartService;
pub use checkout::CheckoutService;
pub use error::{ErrorKind, FulfillmentError, Result};
pub use gateway::{PaymentGateway, StubGateway};
pub use payment::PaymentService;
pub use queries::{OrderPage, OrderQueries, OrderView};
