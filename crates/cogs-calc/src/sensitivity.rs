//! 敏感度分析

use cogs_core::{CostingError, PriceBreakdown, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::solver::PriceSolver;

/// 敏感度分析單點
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityPoint {
    /// 變動幅度（-0.20 ~ +0.20）
    pub change_pct: Decimal,
    pub cogs: Decimal,
    pub list_price: Decimal,
    pub profit: Decimal,
    pub margin_pct: Decimal,
}

impl SensitivityPoint {
    fn from_breakdown(change_pct: Decimal, breakdown: &PriceBreakdown) -> Self {
        Self {
            change_pct,
            cogs: breakdown.cogs,
            list_price: breakdown.list_price,
            profit: breakdown.profit,
            margin_pct: breakdown.margin_pct,
        }
    }
}

/// 敏感度分析結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityReport {
    pub base_cogs: Decimal,
    pub base_price: Decimal,
    /// 成本變動（標價固定）
    pub cogs_sensitivity: Vec<SensitivityPoint>,
    /// 標價變動（成本固定）
    pub price_sensitivity: Vec<SensitivityPoint>,
}

impl SensitivityReport {
    /// 變動幅度為 0 的基準點
    pub fn baseline(&self) -> Option<&SensitivityPoint> {
        self.cogs_sensitivity.iter().find(|p| p.change_pct.is_zero())
    }
}

/// 敏感度分析器
pub struct SensitivityAnalyzer;

impl SensitivityAnalyzer {
    /// 變動幅度：-20% 到 +20%，每步 5%
    pub fn steps() -> Vec<Decimal> {
        (-4..=4).map(|i| Decimal::new(i * 5, 2)).collect()
    }

    /// 分別對成本與標價做 ±20% 擾動，重新拆解利潤與淨利率
    pub fn analyze(
        solver: &PriceSolver<'_>,
        base_cogs: Decimal,
        base_price: Decimal,
    ) -> Result<SensitivityReport> {
        let steps = Self::steps();
        let mut cogs_sensitivity = Vec::with_capacity(steps.len());
        let mut price_sensitivity = Vec::with_capacity(steps.len());

        for &change in &steps {
            let factor = Decimal::ONE + change;
            let scale = |value: Decimal| {
                value.checked_mul(factor).ok_or_else(|| {
                    CostingError::InvalidInput(format!("{} 調整 {} 後超出數值範圍", value, change))
                })
            };

            let cogs_case = solver.breakdown_from_price(scale(base_cogs)?, base_price)?;
            cogs_sensitivity.push(SensitivityPoint::from_breakdown(change, &cogs_case));

            let price_case = solver.breakdown_from_price(base_cogs, scale(base_price)?)?;
            price_sensitivity.push(SensitivityPoint::from_breakdown(change, &price_case));
        }

        Ok(SensitivityReport {
            base_cogs,
            base_price,
            cogs_sensitivity,
            price_sensitivity,
        })
    }
}
