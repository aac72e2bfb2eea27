use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_account_type"))]
pub struct OpenAccountCommand {
    #[validate(length(min = 1))]
    pub account_holder: String,
    pub account_type: i32,
    #[validate(custom = "non_zero_amount")]
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DepositFundCommand {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(custom = "non_zero_amount")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawFundCommand {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(custom = "non_zero_amount")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CloseAccountCommand {
    #[validate(length(min = 1))]
    pub id: String,
}

// Only zero is rejected. Negative amounts are accepted and flow through to
// the projection unchanged.
fn non_zero_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_zero() {
        return Err(ValidationError::new("zero_amount"));
    }
    Ok(())
}

fn validate_account_type(command: &OpenAccountCommand) -> Result<(), ValidationError> {
    if command.account_type == 0 {
        return Err(ValidationError::new("zero_account_type"));
    }
    Ok(())
}
