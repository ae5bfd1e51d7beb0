//! # COGS Pricing
//!
//! 產品成本展開與通路定價引擎
//!
//! - [`cogs_core`]：目錄、通路費用模型、價格拆解、定價配置
//! - [`cogs_calc`]：成本展開、價格反推、批次定價、敏感度分析
//! - [`cogs_cache`]：依目錄版本的增量成本快取

pub use cogs_cache;
pub use cogs_calc;
pub use cogs_core;
pub use rust_decimal::Decimal;

pub use cogs_cache::{CacheStats, DirtyTracker, IncrementalCostCache};
pub use cogs_calc::{
    BatchItem, BatchPricer, BatchSummary, CostLine, CostMap, CostResolver, CostStatus, MarginAlert,
    PriceAlert, PriceSolver, PricingReport, PricingRow, PricingWarning, ResolutionIssue,
    ResolvedCost, RowStatus, SensitivityAnalyzer, SensitivityPoint, SensitivityReport,
    SolveMethod, SolvedPrice, WarningSeverity,
};
pub use cogs_core::{
    Catalog, CatalogIssue, ChannelStore, ComponentRef, Composition, CostingError, CustomFee,
    FeeModel, FeeType, ItemKind, MarginPrice, Material, Package, PackageComponent,
    PlFeeOverride, PriceBreakdown, PricingConfig, Recipe, Result, SolvePrecision,
};
