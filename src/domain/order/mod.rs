pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod number;
pub mod value_objects;

pub use aggregate::{Order, USER_CANCEL_REASON};
pub use command_handler::{
    CancellationReceipt, OrderDetails, OrderService, OrderSettings, OrderSummary,
    PaymentConfirmation, PaymentOutcome, RefundStatus,
};
pub use commands::OrderCommand;
pub use errors::OrderError;
pub use events::OrderEvent;
pub use number::OrderNumberGenerator;
pub use value_objects::{
    OrderLineItem, OrderQuery, OrderStatistics, OrderStatus, OrderSubmitted, PayMethod, PayStatus,
    SubmitOrder,
};
