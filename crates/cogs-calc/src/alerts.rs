//! 毛利與價格警示

use cogs_core::{PriceBreakdown, PricingConfig};
use rust_decimal::Decimal;
use serde::Serialize;

/// 毛利區間警示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MarginAlert {
    /// 虧損（利潤 < 0）
    Loss,
    /// 低於最低毛利
    BelowMinimum,
    /// 低於建議毛利
    BelowRecommended,
    /// 優秀毛利
    Excellent,
}

impl MarginAlert {
    /// 依利潤與淨利率分類；介於建議與優秀之間不發警示
    pub fn classify(profit: Decimal, margin: Decimal, config: &PricingConfig) -> Option<Self> {
        if profit < Decimal::ZERO {
            Some(MarginAlert::Loss)
        } else if margin < config.min_margin {
            Some(MarginAlert::BelowMinimum)
        } else if margin < config.recommended_margin {
            Some(MarginAlert::BelowRecommended)
        } else if margin >= config.excellent_margin {
            Some(MarginAlert::Excellent)
        } else {
            None
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            MarginAlert::Loss => "虧損",
            MarginAlert::BelowMinimum => "低於最低毛利",
            MarginAlert::BelowRecommended => "低於建議毛利",
            MarginAlert::Excellent => "優秀毛利",
        }
    }
}

/// 單一價格拆解的警示
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PriceAlert {
    Margin(MarginAlert),
    /// 標價低於損益兩平價
    BelowBreakeven { breakeven: Decimal },
    /// 淨價低於成本的 1.5 倍
    NearCost,
}

impl PriceAlert {
    /// 收集價格拆解的所有警示
    pub fn collect(breakdown: &PriceBreakdown, config: &PricingConfig) -> Vec<PriceAlert> {
        let mut alerts = Vec::new();

        if let Some(alert) = MarginAlert::classify(breakdown.profit, breakdown.margin_pct, config) {
            alerts.push(PriceAlert::Margin(alert));
        }

        if let Some(breakeven) = breakdown.breakeven_price {
            if breakdown.list_price < breakeven {
                alerts.push(PriceAlert::BelowBreakeven { breakeven });
            }
        }

        let near_cost = breakdown
            .cogs
            .checked_mul(Decimal::new(15, 1))
            .map_or(true, |floor| breakdown.net_price < floor);
        if breakdown.cogs > Decimal::ZERO && near_cost {
            alerts.push(PriceAlert::NearCost);
        }

        alerts
    }
}
