//! # COGS Calculation Engine
//!
//! 成本展開、價格拆解與反推、批次定價、敏感度分析

pub mod alerts;
pub mod batch;
pub mod resolver;
pub mod sensitivity;
pub mod solver;

// Re-export 主要類型
pub use alerts::{MarginAlert, PriceAlert};
pub use batch::{BatchItem, BatchPricer, BatchSummary, PricingReport, PricingRow, RowStatus};
pub use resolver::{
    CostLine, CostMap, CostResolver, CostStatus, Memo, MemoEntry, MemoKey, ResolutionIssue, ResolvedCost,
};
pub use sensitivity::{SensitivityAnalyzer, SensitivityPoint, SensitivityReport};
pub use solver::{PriceSolver, SolveMethod, SolvedPrice};

use serde::Serialize;

/// 定價警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingWarning {
    pub sku: String,
    pub message: String,
    pub severity: WarningSeverity,
}

impl PricingWarning {
    pub fn new(sku: String, message: String, severity: WarningSeverity) -> Self {
        Self {
            sku,
            message,
            severity,
        }
    }

    pub fn info(sku: String, message: String) -> Self {
        Self::new(sku, message, WarningSeverity::Info)
    }

    pub fn warning(sku: String, message: String) -> Self {
        Self::new(sku, message, WarningSeverity::Warning)
    }

    pub fn error(sku: String, message: String) -> Self {
        Self::new(sku, message, WarningSeverity::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}
