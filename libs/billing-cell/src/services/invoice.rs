use crate::error::BillingError;
use crate::models::{InvoiceLine, InvoiceTotal};

fn lines_amount(lines: &[InvoiceLine]) -> Result<u64, BillingError> {
    lines.iter().try_fold(0u64, |sum, line| {
        line.price
            .checked_mul(u64::from(line.quantity))
            .and_then(|amount| sum.checked_add(amount))
            .ok_or(BillingError::AmountOverflow)
    })
}

/// Σ(package price × qty) + Σ(medicine price × qty).
pub fn invoice_total(
    packages: &[InvoiceLine],
    medicines: &[InvoiceLine],
) -> Result<InvoiceTotal, BillingError> {
    let packages_amount = lines_amount(packages)?;
    let medicines_amount = lines_amount(medicines)?;
    let total_amount = packages_amount
        .checked_add(medicines_amount)
        .ok_or(BillingError::AmountOverflow)?;

    Ok(InvoiceTotal {
        packages_amount,
        medicines_amount,
        total_amount,
    })
}
