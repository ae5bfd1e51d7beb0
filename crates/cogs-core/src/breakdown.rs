//! 價格拆解結果

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 某一目標毛利對應的標價（None = 此費率下無法達成）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginPrice {
    pub margin: Decimal,
    pub price: Option<Decimal>,
}

/// 價格拆解（每次計算新建，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// 商品成本
    pub cogs: Decimal,

    /// 標價（含稅、折扣前）
    pub list_price: Decimal,

    /// 折扣率
    pub discount_rate: Decimal,

    /// 折扣金額
    pub discount_amount: Decimal,

    /// 折扣後售價（含稅）
    pub price_after_discount: Decimal,

    /// 稅率
    pub vat_rate: Decimal,

    /// 稅額
    pub vat_amount: Decimal,

    /// 淨價（未稅、折扣後），所有百分比費用的計算基礎
    pub net_price: Decimal,

    /// 運費（免運時為 0）
    pub shipping_fee: Decimal,

    /// 備貨費（免運時為 0）
    pub preparation_fee: Decimal,

    /// 平台費
    pub platform_fee: Decimal,

    /// 行銷費
    pub marketing_fee: Decimal,

    /// 營運費
    pub opex_fee: Decimal,

    /// 各項自訂費用金額
    pub custom_fees: BTreeMap<String, Decimal>,

    /// 自訂費用合計
    pub custom_fees_total: Decimal,

    /// 成本與費用合計
    pub total_costs_fees: Decimal,

    /// 利潤
    pub profit: Decimal,

    /// 淨利率 = 利潤 / 淨價（淨價 ≤ 0 時為 0）
    pub margin_pct: Decimal,

    /// 是否因免運門檻而免收運費與備貨費
    pub free_shipping_applied: bool,

    /// 損益兩平標價（None = 無法達成）
    pub breakeven_price: Option<Decimal>,

    /// 參考毛利對應標價
    pub margin_prices: Vec<MarginPrice>,
}

impl PriceBreakdown {
    /// 淨價 ≤ 0，比例指標無意義
    pub fn is_degenerate(&self) -> bool {
        self.net_price <= Decimal::ZERO
    }

    /// 毛利 = 淨價 - 成本
    pub fn gross_profit(&self) -> Decimal {
        self.net_price - self.cogs
    }

    /// 加成率 = 利潤 / 成本（成本為 0 時為 0）
    pub fn markup(&self) -> Decimal {
        self.profit.checked_div(self.cogs).unwrap_or(Decimal::ZERO)
    }

    /// 投資報酬率 = 利潤 / 成本費用合計
    pub fn roi(&self) -> Decimal {
        self.profit
            .checked_div(self.total_costs_fees)
            .unwrap_or(Decimal::ZERO)
    }

    /// 安全邊際 = (標價 - 損益兩平價) / 標價
    pub fn safety_margin(&self) -> Option<Decimal> {
        let breakeven = self.breakeven_price?;
        (self.list_price - breakeven).checked_div(self.list_price)
    }

    /// 查詢參考毛利對應標價
    pub fn price_at_margin(&self, margin: Decimal) -> Option<Decimal> {
        self.margin_prices
            .iter()
            .find(|mp| mp.margin == margin)
            .and_then(|mp| mp.price)
    }

    /// 所有費用（不含商品成本）合計
    pub fn total_fees(&self) -> Decimal {
        self.total_costs_fees - self.cogs
    }
}
