//! 原物料模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 原物料（成本樹的葉節點）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// 料號
    pub sku: String,

    /// 名稱
    pub name: String,

    /// 分類
    pub category: String,

    /// 採購單位
    pub unit: String,

    /// 單位成本
    pub cost_per_unit: Decimal,
}

impl Material {
    /// 創建新的原物料
    pub fn new(sku: impl Into<String>, cost_per_unit: Decimal) -> Self {
        let sku = sku.into();
        Self {
            name: sku.clone(),
            sku,
            category: "Unknown".to_string(),
            unit: "Unit".to_string(),
            cost_per_unit,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 建構器模式：設置分類
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// 建構器模式：設置單位
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// 計算指定用量的成本（超出數值範圍時為 None）
    pub fn cost_for(&self, quantity: Decimal) -> Option<Decimal> {
        self.cost_per_unit.checked_mul(quantity)
    }
}
