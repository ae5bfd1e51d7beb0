//! # COGS Core
//!
//! 核心資料模型與類型定義：物料、配方、組合包、通路費用模型與價格拆解

pub mod breakdown;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod fees;
pub mod material;

// Re-export 主要類型
pub use breakdown::{MarginPrice, PriceBreakdown};
pub use catalog::{
    Catalog, CatalogIssue, ComponentRef, Composition, ItemKind, Package, PackageComponent, Recipe,
};
pub use channel::ChannelStore;
pub use config::{PricingConfig, SolvePrecision};
pub use fees::{CustomFee, FeeModel, FeeType, PlFeeOverride};
pub use material::Material;

use rust_decimal::Decimal;

/// 成本與定價錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum CostingError {
    #[error("找不到料號: {0}")]
    SkuNotFound(String),

    #[error("找不到銷售通路或通路未設定費用: {0}")]
    ChannelNotFound(String),

    #[error("目標毛利無法達成：變動費率 {variable_pct} + 目標毛利 {target_margin} 已達或超過 100%")]
    MarginUnreachable {
        target_margin: Decimal,
        variable_pct: Decimal,
    },

    #[error("折扣率無效: {0}（必須介於 0 與 1 之間，且小於 1）")]
    InvalidDiscount(Decimal),

    #[error("費用模型無效: {0}")]
    InvalidFeeModel(String),

    #[error("目錄資料無效: {0}")]
    InvalidCatalog(String),

    #[error("數值輸入無效: {0}")]
    InvalidInput(String),

    #[error("料號 {sku} 的成本無法解析: {reason}")]
    UnresolvedCost { sku: String, reason: String },

    #[error("通路設定檔讀寫錯誤: {0}")]
    Io(#[from] std::io::Error),

    #[error("通路設定檔格式錯誤: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CostingError {
    /// 是否為可預期的商業不可行情況（而非資料或程式錯誤）
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            CostingError::MarginUnreachable { .. }
                | CostingError::InvalidDiscount(_)
                | CostingError::ChannelNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CostingError>;
