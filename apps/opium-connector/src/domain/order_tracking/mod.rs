//! Order lifecycle domain: in-flight orders, states, and emitted events.

mod events;
mod in_flight_order;
mod state_machine;

pub use events::{
    ConnectorEvent, OrderCancelled, OrderCompleted, OrderCreated, OrderFailure, OrderFilled,
};
pub use in_flight_order::{Fill, FillOutcome, InFlightOrder};
pub use state_machine::{OrderKind, OrderStateMachine, OrderStatus, TradeSide};
