//! 价格计算
//!
//! 所有舍入均采用 half-even（银行家舍入），并固定结果的小数位数：
//! 折后价与明细小计保留 1 位，订单合计保留 2 位。

use crate::error::{AppError, AppResult};
use rust_decimal::{Decimal, RoundingStrategy};

pub const MAX_DISCOUNT: i32 = 100;
pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 100;
/// products.price 为 numeric(15,2)
pub const PRICE_LIMIT: i64 = 10_000_000_000_000;
/// new_price / total / sum_total 为 numeric(10,2)
pub const AMOUNT_LIMIT: i64 = 100_000_000;

/// Round to `dp` places (half-even) and pin the scale so `8` renders as `8.0`.
pub fn quantize(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(dp);
    rounded
}

pub fn validate_discount(discount: i32) -> AppResult<()> {
    if !(0..=MAX_DISCOUNT).contains(&discount) {
        return Err(AppError::ValidationError(format!(
            "Discount must be between 0 and {MAX_DISCOUNT}"
        )));
    }
    Ok(())
}

pub fn validate_price(price: Decimal) -> AppResult<()> {
    if price.is_sign_negative() {
        return Err(AppError::ValidationError(
            "Price must not be negative".to_string(),
        ));
    }
    if price >= Decimal::from(PRICE_LIMIT) {
        return Err(AppError::ValidationError(format!(
            "Price must be less than {PRICE_LIMIT}"
        )));
    }
    Ok(())
}

/// 金额列为 numeric(10,2)
pub fn ensure_amount(value: Decimal, what: &str) -> AppResult<Decimal> {
    if value >= Decimal::from(AMOUNT_LIMIT) {
        return Err(AppError::ValidationError(format!(
            "{what} must be less than {AMOUNT_LIMIT}"
        )));
    }
    Ok(value)
}

fn overflow(what: &str) -> AppError {
    AppError::ValidationError(format!("{what} is out of range"))
}

pub fn validate_quantity(quantity: i32) -> AppResult<()> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(AppError::ValidationError(format!(
            "Quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// new_price = round(price * (100 - discount) / 100, 1)
pub fn discounted_price(price: Decimal, discount: i32) -> AppResult<Decimal> {
    validate_price(price)?;
    validate_discount(discount)?;
    let hundred = Decimal::ONE_HUNDRED;
    let raw = price
        .checked_mul(hundred - Decimal::from(discount))
        .and_then(|v| v.checked_div(hundred))
        .ok_or_else(|| overflow("Discounted price"))?;
    ensure_amount(quantize(raw, 1), "Discounted price")
}

/// total = round(quantity * new_price, 1)
pub fn line_total(quantity: i32, unit_price: Decimal) -> AppResult<Decimal> {
    validate_quantity(quantity)?;
    let raw = Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| overflow("Order item total"))?;
    ensure_amount(quantize(raw, 1), "Order item total")
}

/// sum_total = round(Σ totals, 2)
pub fn sum_totals<I>(totals: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    quantize(totals.into_iter().sum(), 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_discounted_price() {
        assert_eq!(discounted_price(dec("10.00"), 20).unwrap(), dec("8.0"));
        assert_eq!(discounted_price(dec("10.00"), 20).unwrap().to_string(), "8.0");
        assert_eq!(discounted_price(dec("12.99"), 0).unwrap(), dec("13.0"));
        assert_eq!(discounted_price(dec("12.99"), 100).unwrap(), dec("0.0"));
        // 3.45 * 0.9 = 3.105 -> 3.1
        assert_eq!(discounted_price(dec("3.45"), 10).unwrap(), dec("3.1"));
    }

    #[test]
    fn test_discounted_price_rejects_out_of_range() {
        assert!(discounted_price(dec("10.00"), 101).is_err());
        assert!(discounted_price(dec("10.00"), -1).is_err());
        assert!(discounted_price(dec("-1.00"), 10).is_err());
    }

    #[test]
    fn test_price_bounded_by_column_precision() {
        // 极大值不能 panic，只能是校验错误
        let err = discounted_price(Decimal::MAX, 20).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = discounted_price(dec("100000000000000000"), 20).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(validate_price(dec("9999999999999.99")).is_ok());
        assert!(validate_price(dec("10000000000000")).is_err());
    }

    #[test]
    fn test_amounts_must_fit_amount_columns() {
        // price 合法，但折后价超出 numeric(10,2)
        assert!(discounted_price(dec("200000000.00"), 0).is_err());
        assert_eq!(
            discounted_price(dec("99999999.99"), 50).unwrap(),
            dec("50000000.0")
        );
        assert!(line_total(100, dec("1000000.0")).is_err());
        assert!(line_total(2, Decimal::MAX).is_err());
        assert_eq!(line_total(99, dec("1000000.0")).unwrap(), dec("99000000.0"));
    }

    #[test]
    fn test_half_even_rounding() {
        assert_eq!(quantize(dec("0.25"), 1), dec("0.2"));
        assert_eq!(quantize(dec("0.35"), 1), dec("0.4"));
        assert_eq!(quantize(dec("1.005"), 2), dec("1.00"));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(3, dec("8.0")).unwrap(), dec("24.0"));
        assert_eq!(line_total(100, dec("0.5")).unwrap(), dec("50.0"));
        assert!(line_total(0, dec("8.0")).is_err());
        assert!(line_total(101, dec("8.0")).is_err());
    }

    #[test]
    fn test_sum_totals() {
        let total = sum_totals(vec![dec("24.0"), dec("24.0")]);
        assert_eq!(total, dec("48.00"));
        assert_eq!(total.to_string(), "48.00");
        assert_eq!(sum_totals(Vec::<Decimal>::new()).to_string(), "0.00");
    }

    #[test]
    fn test_storefront_example() {
        let new_price = discounted_price(dec("10.00"), 20).unwrap();
        let item_total = line_total(3, new_price).unwrap();
        assert_eq!(item_total, dec("24.0"));
        assert_eq!(sum_totals([item_total, item_total]), dec("48.00"));
    }
}
