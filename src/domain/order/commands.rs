use serde::{Deserialize, Serialize};

// ============================================================================
// Order Commands (transitions on an existing order)
// ============================================================================
//
// Submission is not a command: it creates the order from the cart and is
// handled directly by OrderService::submit_order.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderCommand {
    /// Payment provider confirmed the charge for this order
    ConfirmPayment,

    /// Staff accepts the order
    Confirm,

    /// Staff refuses the order
    Reject { reason: String },

    /// Staff or admin cancels the order
    Cancel { reason: String },

    /// Customer cancels their own order
    UserCancel,

    /// Rider picked the order up
    Dispatch,

    /// Order delivered
    Complete,

    /// Customer nudges the kitchen
    Remind,
}

impl OrderCommand {
    /// Short verb used in error messages, logs and metrics labels
    pub fn action(&self) -> &'static str {
        match self {
            OrderCommand::ConfirmPayment => "confirm_payment",
            OrderCommand::Confirm => "confirm",
            OrderCommand::Reject { .. } => "reject",
            OrderCommand::Cancel { .. } => "cancel",
            OrderCommand::UserCancel => "user_cancel",
            OrderCommand::Dispatch => "dispatch",
            OrderCommand::Complete => "complete",
            OrderCommand::Remind => "remind",
        }
    }
}
