//! 定價配置模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 目標毛利反推標價的精度策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolvePrecision {
    /// 封閉解（單次代數反推）
    ClosedForm,

    /// 封閉解 + 二分搜尋校正
    ///
    /// 以完整拆解驗證封閉解；誤差超過容許值時在價格區間內二分搜尋。
    Bisection {
        max_iterations: u32,
        tolerance: Decimal,
    },
}

impl Default for SolvePrecision {
    fn default() -> Self {
        SolvePrecision::Bisection {
            max_iterations: 100,
            tolerance: Decimal::new(1, 4),
        }
    }
}

/// 定價配置（商業規則與演算法參數）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// 最低可接受毛利
    pub min_margin: Decimal,

    /// 建議毛利
    pub recommended_margin: Decimal,

    /// 優秀毛利
    pub excellent_margin: Decimal,

    /// 最大折扣率
    pub max_discount_rate: Decimal,

    /// 價格拆解附帶的參考毛利
    pub reference_margins: Vec<Decimal>,

    /// 毛利情境分析使用的毛利
    pub scenario_margins: Vec<Decimal>,

    /// 反推精度
    pub precision: SolvePrecision,

    /// 成本展開最大深度（防止過深巢狀造成堆疊溢位）
    pub max_resolution_depth: usize,

    /// 批次定價是否並行
    pub parallel_batch: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_margin: Decimal::new(5, 2),
            recommended_margin: Decimal::new(15, 2),
            excellent_margin: Decimal::new(25, 2),
            max_discount_rate: Decimal::new(50, 2),
            reference_margins: (0..=4).map(|i| Decimal::new(i * 5, 2)).collect(),
            scenario_margins: (0..=8).map(|i| Decimal::new(i * 5, 2)).collect(),
            precision: SolvePrecision::default(),
            max_resolution_depth: 64,
            parallel_batch: true,
        }
    }
}

impl PricingConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置毛利警示門檻
    pub fn with_margin_bands(mut self, minimum: Decimal, recommended: Decimal, excellent: Decimal) -> Self {
        self.min_margin = minimum;
        self.recommended_margin = recommended;
        self.excellent_margin = excellent;
        self
    }

    /// 建構器模式：設置最大折扣率
    pub fn with_max_discount_rate(mut self, rate: Decimal) -> Self {
        self.max_discount_rate = rate;
        self
    }

    /// 建構器模式：設置參考毛利
    pub fn with_reference_margins(mut self, margins: Vec<Decimal>) -> Self {
        self.reference_margins = margins;
        self
    }

    /// 建構器模式：設置情境毛利
    pub fn with_scenario_margins(mut self, margins: Vec<Decimal>) -> Self {
        self.scenario_margins = margins;
        self
    }

    /// 建構器模式：設置反推精度
    pub fn with_precision(mut self, precision: SolvePrecision) -> Self {
        self.precision = precision;
        self
    }

    /// 建構器模式：設置成本展開最大深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 建構器模式：設置批次是否並行
    pub fn with_parallel_batch(mut self, parallel: bool) -> Self {
        self.parallel_batch = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PricingConfig::default();

        assert_eq!(config.min_margin, Decimal::new(5, 2));
        assert_eq!(config.recommended_margin, Decimal::new(15, 2));
        assert_eq!(config.excellent_margin, Decimal::new(25, 2));
        assert_eq!(config.reference_margins.len(), 5);
        assert_eq!(config.reference_margins[4], Decimal::new(20, 2));
        assert_eq!(config.scenario_margins.last(), Some(&Decimal::new(40, 2)));
        assert_eq!(
            config.precision,
            SolvePrecision::Bisection {
                max_iterations: 100,
                tolerance: Decimal::new(1, 4),
            }
        );
    }

    #[test]
    fn test_config_builder() {
        let config = PricingConfig::new()
            .with_precision(SolvePrecision::ClosedForm)
            .with_max_resolution_depth(8)
            .with_parallel_batch(false);

        assert_eq!(config.precision, SolvePrecision::ClosedForm);
        assert_eq!(config.max_resolution_depth, 8);
        assert!(!config.parallel_batch);
    }
}
