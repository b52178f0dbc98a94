pub mod invoker;
pub mod metrics;
pub mod providers;
pub mod selector;

pub use invoker::{InvocationOutcome, ModelInvoker, Rejection};
pub use selector::{FanOutStrategy, Selection, SelectionError, SentenceSelector};
