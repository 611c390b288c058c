//! The buyer-facing surface of a checkout.

use crate::orchestrator::PaymentState;

/// Shown instead of starting a payment when the backend already holds a proof for the order.
pub const ALREADY_PAID_MESSAGE: &str = "It seems that you have paid for this order already.";

/// Receives everything the buyer should see.
///
/// Calls come from the orchestrator's attempt tasks; implementations must not block.
pub trait CheckoutUi: Send + Sync {
    /// Clears the message area at the start of an attempt.
    fn reset_message(&self);
    fn show_info(&self, message: &str);
    fn show_error(&self, message: &str);
    fn state_changed(&self, _state: &PaymentState) {}
}

/// Writes messages to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl CheckoutUi for ConsoleUi {
    fn reset_message(&self) {}

    fn show_info(&self, message: &str) {
        println!("{message}");
    }

    fn show_error(&self, message: &str) {
        eprintln!("{message}");
    }

    fn state_changed(&self, state: &PaymentState) {
        match state {
            PaymentState::AwaitingTransaction => println!("Sending the payment transaction..."),
            PaymentState::SubmittingProof => println!("Submitting proof of payment..."),
            PaymentState::Done => println!("Payment complete."),
            _ => {}
        }
    }
}
