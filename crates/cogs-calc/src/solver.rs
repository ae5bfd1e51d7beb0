//! 價格拆解與目標毛利反推
//!
//! 所有百分比費用以「折扣後、未稅淨價」為基礎：
//!
//! ```text
//! 標價 ─(折扣)→ 折扣後售價 ─(÷(1+稅率))→ 淨價 ─(× 各項費率)→ 費用
//! ```
//!
//! 反推公式：
//!
//! ```text
//! denominator = 1 − 變動費率 − 目標毛利
//! 淨價 = (成本 + 運費 + 備貨費 + 固定自訂費用) / denominator
//! 標價 = 淨價 × (1 + 稅率) / (1 − 折扣率)
//! ```

use cogs_core::{
    CostingError, FeeModel, MarginPrice, PriceBreakdown, PricingConfig, Result, SolvePrecision,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::alerts::PriceAlert;

/// 反推所用方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveMethod {
    ClosedForm,
    Bisection,
}

/// 反推結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolvedPrice {
    pub list_price: Decimal,
    pub breakdown: PriceBreakdown,
    pub method: SolveMethod,
    pub iterations: u32,
    /// 實際淨利率 − 目標毛利
    pub margin_error: Decimal,
    pub converged: bool,
}

/// 價格求解器
pub struct PriceSolver<'a> {
    fees: &'a FeeModel,
    config: &'a PricingConfig,
}

impl<'a> PriceSolver<'a> {
    /// 創建求解器（費用模型不合法時返回錯誤）
    pub fn new(fees: &'a FeeModel, config: &'a PricingConfig) -> Result<Self> {
        fees.validate()?;
        Ok(Self { fees, config })
    }

    pub fn fees(&self) -> &FeeModel {
        self.fees
    }

    pub fn config(&self) -> &PricingConfig {
        self.config
    }

    /// 由標價拆解出各項費用、利潤與淨利率，並附帶損益兩平價與參考毛利標價
    pub fn breakdown_from_price(&self, cogs: Decimal, list_price: Decimal) -> Result<PriceBreakdown> {
        let mut breakdown = self.decompose(cogs, list_price)?;

        breakdown.breakeven_price = self.price_for_margin(cogs, Decimal::ZERO).ok();
        breakdown.margin_prices = self.margin_prices(cogs, &self.config.reference_margins);

        Ok(breakdown)
    }

    /// 反推達成目標毛利的標價（封閉解）
    pub fn price_for_margin(&self, cogs: Decimal, target_margin: Decimal) -> Result<Decimal> {
        self.price_for_margin_with(
            cogs,
            target_margin,
            self.fees.shipping_fixed,
            self.fees.preparation_fee,
        )
    }

    /// 反推標價，使用指定的運費與備貨費
    ///
    /// 免運門檻啟用時先試算免運價格；免運價格為正且低於門檻即採用，
    /// 否則採用含運費的價格。兩個候選價格互斥，一步即達定點。
    pub fn price_for_margin_with(
        &self,
        cogs: Decimal,
        target_margin: Decimal,
        shipping: Decimal,
        preparation: Decimal,
    ) -> Result<Decimal> {
        if cogs < Decimal::ZERO {
            return Err(CostingError::InvalidInput(format!("成本不可為負: {}", cogs)));
        }
        self.check_discount()?;

        let variable_pct = self.fees.total_variable_pct();
        let denominator = Decimal::ONE - variable_pct - target_margin;
        if denominator <= Decimal::ZERO {
            return Err(CostingError::MarginUnreachable {
                target_margin,
                variable_pct,
            });
        }

        let fixed_custom = self.fees.fixed_custom_total();
        let fixed_with_fees = checked_sum([cogs, shipping, preparation, fixed_custom])
            .ok_or_else(|| out_of_range("成本與固定費用合計"))?;
        let with_fees = self.gross_up(fixed_with_fees, denominator)?;

        if self.fees.has_free_shipping_threshold() {
            let fixed_without_fees = checked_sum([cogs, fixed_custom])
                .ok_or_else(|| out_of_range("成本與固定費用合計"))?;
            let without_fees = self.gross_up(fixed_without_fees, denominator)?;
            if without_fees > Decimal::ZERO && without_fees < self.fees.free_shipping_threshold {
                return Ok(without_fees);
            }
        }

        Ok(with_fees)
    }

    /// 依配置的精度策略反推標價
    pub fn solve(&self, cogs: Decimal, target_margin: Decimal) -> Result<SolvedPrice> {
        let seed = self.price_for_margin(cogs, target_margin)?;

        match self.config.precision {
            SolvePrecision::ClosedForm => {
                let breakdown = self.breakdown_from_price(cogs, seed)?;
                let margin_error = breakdown.margin_pct - target_margin;
                Ok(SolvedPrice {
                    list_price: seed,
                    breakdown,
                    method: SolveMethod::ClosedForm,
                    iterations: 0,
                    margin_error,
                    converged: true,
                })
            }
            SolvePrecision::Bisection {
                max_iterations,
                tolerance,
            } => self.refine(cogs, target_margin, seed, max_iterations, tolerance),
        }
    }

    /// 各情境毛利對應的標價
    pub fn margin_scenarios(&self, cogs: Decimal) -> Vec<MarginPrice> {
        self.margin_prices(cogs, &self.config.scenario_margins)
    }

    /// 價格拆解的警示
    pub fn price_alerts(&self, breakdown: &PriceBreakdown) -> Vec<PriceAlert> {
        PriceAlert::collect(breakdown, self.config)
    }

    /// 先驗證封閉解；誤差超過容許值時以二分搜尋校正
    fn refine(
        &self,
        cogs: Decimal,
        target_margin: Decimal,
        seed: Decimal,
        max_iterations: u32,
        tolerance: Decimal,
    ) -> Result<SolvedPrice> {
        let seed_error = self.decompose(cogs, seed)?.margin_pct - target_margin;
        if seed_error.abs() < tolerance || seed.is_zero() {
            return self.finish(cogs, target_margin, seed, SolveMethod::ClosedForm, 0, tolerance);
        }

        let two = Decimal::from(2);
        let cogs_low = cogs
            .checked_mul(Decimal::new(11, 1))
            .ok_or_else(|| out_of_range("搜尋下限"))?;
        let cogs_high = cogs
            .checked_mul(Decimal::from(10))
            .ok_or_else(|| out_of_range("搜尋上限"))?;
        let seed_high = seed.checked_mul(two).ok_or_else(|| out_of_range("搜尋上限"))?;

        let mut low = cogs_low.min(seed / two).max(Decimal::ZERO);
        let mut high = cogs_high.max(seed_high);
        let mut best = (seed, seed_error.abs());
        let mut iterations = 0;

        for i in 1..=max_iterations {
            iterations = i;
            let mid = low + (high - low) / two;
            let candidate = self.decompose(cogs, mid)?;
            let error = candidate.margin_pct - target_margin;

            // 淨價為 0 的候選價格不可採用
            if !candidate.is_degenerate() {
                if error.abs() < best.1 {
                    best = (mid, error.abs());
                }
                if error.abs() < tolerance {
                    break;
                }
            }

            if error < Decimal::ZERO {
                low = mid;
            } else {
                high = mid;
            }
        }

        tracing::debug!(
            "二分搜尋校正: 成本 {}, 目標毛利 {}, 封閉解 {} → {} ({} 次)",
            cogs,
            target_margin,
            seed,
            best.0,
            iterations
        );

        self.finish(cogs, target_margin, best.0, SolveMethod::Bisection, iterations, tolerance)
    }

    fn finish(
        &self,
        cogs: Decimal,
        target_margin: Decimal,
        list_price: Decimal,
        method: SolveMethod,
        iterations: u32,
        tolerance: Decimal,
    ) -> Result<SolvedPrice> {
        let breakdown = self.breakdown_from_price(cogs, list_price)?;
        let margin_error = breakdown.margin_pct - target_margin;
        Ok(SolvedPrice {
            list_price,
            breakdown,
            method,
            iterations,
            margin_error,
            converged: margin_error.abs() < tolerance,
        })
    }

    fn margin_prices(&self, cogs: Decimal, margins: &[Decimal]) -> Vec<MarginPrice> {
        margins
            .iter()
            .map(|&margin| MarginPrice {
                margin,
                price: self.price_for_margin(cogs, margin).ok(),
            })
            .collect()
    }

    /// 淨價 → 標價
    fn gross_up(&self, fixed_costs: Decimal, denominator: Decimal) -> Result<Decimal> {
        fixed_costs
            .checked_div(denominator)
            .and_then(|net| net.checked_mul(Decimal::ONE + self.fees.vat_rate))
            .and_then(|gross| gross.checked_div(Decimal::ONE - self.fees.discount_rate))
            .ok_or_else(|| out_of_range("反推標價"))
    }

    fn check_discount(&self) -> Result<()> {
        let rate = self.fees.discount_rate;
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(CostingError::InvalidDiscount(rate));
        }
        Ok(())
    }

    /// 拆解（不含損益兩平價與參考毛利標價）
    fn decompose(&self, cogs: Decimal, list_price: Decimal) -> Result<PriceBreakdown> {
        if cogs < Decimal::ZERO {
            return Err(CostingError::InvalidInput(format!("成本不可為負: {}", cogs)));
        }
        if list_price < Decimal::ZERO {
            return Err(CostingError::InvalidInput(format!("標價不可為負: {}", list_price)));
        }
        self.check_discount()?;

        let fees = self.fees;

        // 1. 折扣
        let discount_amount = list_price * fees.discount_rate;
        let price_after_discount = list_price - discount_amount;

        // 2. 扣除稅額
        let net_price = price_after_discount / (Decimal::ONE + fees.vat_rate);
        let vat_amount = price_after_discount - net_price;

        // 3. 免運判斷（嚴格小於門檻）
        let free_shipping_applied = fees.waives_fixed_fees(list_price);
        let (shipping_fee, preparation_fee) = if free_shipping_applied {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (fees.shipping_fixed, fees.preparation_fee)
        };

        // 4. 百分比費用
        let platform_fee = net_price * fees.platform_pct;
        let marketing_fee = net_price * fees.marketing_pct;
        let opex_fee = net_price * fees.opex_pct;

        let custom_fees: BTreeMap<String, Decimal> = fees
            .custom_fees
            .iter()
            .map(|(name, fee)| (name.clone(), fee.amount_on(net_price)))
            .collect();
        let custom_fees_total = checked_sum(custom_fees.values().copied())
            .ok_or_else(|| out_of_range("自訂費用合計"))?;

        // 5-6. 合計、利潤、淨利率
        let total_costs_fees = checked_sum([
            cogs,
            shipping_fee,
            preparation_fee,
            platform_fee,
            marketing_fee,
            opex_fee,
            custom_fees_total,
        ])
        .ok_or_else(|| out_of_range("成本費用合計"))?;
        let profit = net_price - total_costs_fees;
        let margin_pct = if net_price > Decimal::ZERO {
            profit
                .checked_div(net_price)
                .ok_or_else(|| out_of_range("淨利率"))?
        } else {
            Decimal::ZERO
        };

        Ok(PriceBreakdown {
            cogs,
            list_price,
            discount_rate: fees.discount_rate,
            discount_amount,
            price_after_discount,
            vat_rate: fees.vat_rate,
            vat_amount,
            net_price,
            shipping_fee,
            preparation_fee,
            platform_fee,
            marketing_fee,
            opex_fee,
            custom_fees,
            custom_fees_total,
            total_costs_fees,
            profit,
            margin_pct,
            free_shipping_applied,
            breakeven_price: None,
            margin_prices: Vec::new(),
        })
    }
}

/// 逐項加總（溢位時為 None）
fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
}

fn out_of_range(what: &str) -> CostingError {
    CostingError::InvalidInput(format!("{}超出數值範圍", what))
}
