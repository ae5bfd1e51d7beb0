//! 銷售通路費用模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CostingError, Result};

/// 自訂費用類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    /// 淨價（未稅、折扣後）的百分比
    Percentage,
    /// 固定金額
    Fixed,
}

/// 通路自訂費用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFee {
    /// 費用名稱
    pub name: String,

    /// 金額或比例（依 fee_type）
    pub amount: Decimal,

    /// 費用類型
    pub fee_type: FeeType,
}

impl CustomFee {
    pub fn percentage(name: impl Into<String>, rate: Decimal) -> Self {
        Self {
            name: name.into(),
            amount: rate,
            fee_type: FeeType::Percentage,
        }
    }

    pub fn fixed(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
            fee_type: FeeType::Fixed,
        }
    }

    /// 依淨價計算此費用金額
    pub fn amount_on(&self, net_price: Decimal) -> Decimal {
        match self.fee_type {
            FeeType::Percentage => net_price * self.amount,
            FeeType::Fixed => self.amount,
        }
    }
}

/// 損益表推算的實際費率（可覆蓋通路設定）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlFeeOverride {
    pub platform_pct: Option<Decimal>,
    pub marketing_pct: Option<Decimal>,
    pub opex_pct: Option<Decimal>,
}

/// 通路費用模型
///
/// 所有百分比費用都以「折扣後、未稅淨價」為基礎計算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    /// 通路名稱
    #[serde(default)]
    pub channel_name: String,

    /// 平台抽成比例
    pub platform_pct: Decimal,

    /// 行銷費用比例
    pub marketing_pct: Decimal,

    /// 營運費用比例
    pub opex_pct: Decimal,

    /// 增值稅率
    pub vat_rate: Decimal,

    /// 折扣率
    pub discount_rate: Decimal,

    /// 固定運費
    pub shipping_fixed: Decimal,

    /// 備貨費
    pub preparation_fee: Decimal,

    /// 免運門檻（含稅、折扣前標價；0 = 停用）
    ///
    /// 標價「嚴格低於」門檻時免收運費與備貨費。
    #[serde(default)]
    pub free_shipping_threshold: Decimal,

    /// 自訂費用（依名稱排序）
    #[serde(default)]
    pub custom_fees: BTreeMap<String, CustomFee>,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            channel_name: String::new(),
            platform_pct: Decimal::new(3, 2),
            marketing_pct: Decimal::new(28, 2),
            opex_pct: Decimal::new(4, 2),
            vat_rate: Decimal::new(15, 2),
            discount_rate: Decimal::new(10, 2),
            shipping_fixed: Decimal::from(20),
            preparation_fee: Decimal::from(6),
            free_shipping_threshold: Decimal::ZERO,
            custom_fees: BTreeMap::new(),
        }
    }
}

impl FeeModel {
    /// 創建所有費率為 0 的費用模型
    pub fn zero(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            platform_pct: Decimal::ZERO,
            marketing_pct: Decimal::ZERO,
            opex_pct: Decimal::ZERO,
            vat_rate: Decimal::ZERO,
            discount_rate: Decimal::ZERO,
            shipping_fixed: Decimal::ZERO,
            preparation_fee: Decimal::ZERO,
            free_shipping_threshold: Decimal::ZERO,
            custom_fees: BTreeMap::new(),
        }
    }

    /// 建構器模式：設置通路名稱
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// 建構器模式：設置平台、行銷、營運費率
    pub fn with_percentages(mut self, platform: Decimal, marketing: Decimal, opex: Decimal) -> Self {
        self.platform_pct = platform;
        self.marketing_pct = marketing;
        self.opex_pct = opex;
        self
    }

    /// 建構器模式：設置稅率
    pub fn with_vat_rate(mut self, rate: Decimal) -> Self {
        self.vat_rate = rate;
        self
    }

    /// 建構器模式：設置折扣率
    pub fn with_discount_rate(mut self, rate: Decimal) -> Self {
        self.discount_rate = rate;
        self
    }

    /// 建構器模式：設置運費與備貨費
    pub fn with_fixed_fees(mut self, shipping: Decimal, preparation: Decimal) -> Self {
        self.shipping_fixed = shipping;
        self.preparation_fee = preparation;
        self
    }

    /// 建構器模式：設置免運門檻
    pub fn with_free_shipping_threshold(mut self, threshold: Decimal) -> Self {
        self.free_shipping_threshold = threshold;
        self
    }

    /// 建構器模式：加入自訂費用（同名覆蓋）
    pub fn with_custom_fee(mut self, fee: CustomFee) -> Self {
        self.custom_fees.insert(fee.name.clone(), fee);
        self
    }

    /// 套用損益表推算的實際費率
    pub fn with_pl_override(mut self, pl: &PlFeeOverride) -> Self {
        if let Some(platform) = pl.platform_pct {
            self.platform_pct = platform;
        }
        if let Some(marketing) = pl.marketing_pct {
            self.marketing_pct = marketing;
        }
        if let Some(opex) = pl.opex_pct {
            self.opex_pct = opex;
        }
        self
    }

    /// 百分比類自訂費用合計
    pub fn percentage_custom_total(&self) -> Decimal {
        self.custom_fees
            .values()
            .filter(|f| f.fee_type == FeeType::Percentage)
            .map(|f| f.amount)
            .sum()
    }

    /// 固定金額類自訂費用合計
    pub fn fixed_custom_total(&self) -> Decimal {
        self.custom_fees
            .values()
            .filter(|f| f.fee_type == FeeType::Fixed)
            .map(|f| f.amount)
            .sum()
    }

    /// 變動費率合計 = 平台 + 行銷 + 營運 + 百分比類自訂費用
    pub fn total_variable_pct(&self) -> Decimal {
        self.platform_pct + self.marketing_pct + self.opex_pct + self.percentage_custom_total()
    }

    /// 免運門檻是否啟用
    pub fn has_free_shipping_threshold(&self) -> bool {
        self.free_shipping_threshold > Decimal::ZERO
    }

    /// 依標價判斷是否免收運費與備貨費（嚴格小於門檻）
    pub fn waives_fixed_fees(&self, list_price: Decimal) -> bool {
        self.has_free_shipping_threshold() && list_price < self.free_shipping_threshold
    }

    /// 是否完全沒有設定任何費用
    pub fn has_no_fees(&self) -> bool {
        self.total_variable_pct().is_zero()
            && self.shipping_fixed.is_zero()
            && self.preparation_fee.is_zero()
            && self.fixed_custom_total().is_zero()
    }

    /// 檢查費率範圍
    pub fn validate(&self) -> Result<()> {
        let unit_rates = [
            ("platform_pct", self.platform_pct),
            ("marketing_pct", self.marketing_pct),
            ("opex_pct", self.opex_pct),
        ];
        for (field, value) in unit_rates {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                return Err(CostingError::InvalidFeeModel(format!(
                    "{}: {} 必須介於 [0, 1)",
                    field, value
                )));
            }
        }

        if self.discount_rate < Decimal::ZERO || self.discount_rate >= Decimal::ONE {
            return Err(CostingError::InvalidDiscount(self.discount_rate));
        }

        if self.vat_rate < Decimal::ZERO {
            return Err(CostingError::InvalidFeeModel(format!(
                "vat_rate: {} 不可為負",
                self.vat_rate
            )));
        }

        let fixed = [
            ("shipping_fixed", self.shipping_fixed),
            ("preparation_fee", self.preparation_fee),
            ("free_shipping_threshold", self.free_shipping_threshold),
        ];
        for (field, value) in fixed {
            if value < Decimal::ZERO {
                return Err(CostingError::InvalidFeeModel(format!(
                    "{}: {} 不可為負",
                    field, value
                )));
            }
        }

        for fee in self.custom_fees.values() {
            if fee.amount < Decimal::ZERO {
                return Err(CostingError::InvalidFeeModel(format!(
                    "自訂費用 {} 的金額不可為負: {}",
                    fee.name, fee.amount
                )));
            }
            if fee.fee_type == FeeType::Percentage && fee.amount >= Decimal::ONE {
                return Err(CostingError::InvalidFeeModel(format!(
                    "自訂費用 {} 的比例必須小於 1: {}",
                    fee.name, fee.amount
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_total_variable_pct() {
        let fees = FeeModel::zero("test")
            .with_percentages(Decimal::new(10, 2), Decimal::new(20, 2), Decimal::new(5, 2))
            .with_custom_fee(CustomFee::percentage("payment", Decimal::new(25, 3)))
            .with_custom_fee(CustomFee::fixed("packaging", Decimal::from(3)));

        assert_eq!(fees.total_variable_pct(), Decimal::new(375, 3));
        assert_eq!(fees.fixed_custom_total(), Decimal::from(3));
        assert_eq!(fees.percentage_custom_total(), Decimal::new(25, 3));
    }

    #[test]
    fn test_custom_fee_amount() {
        let pct = CustomFee::percentage("payment", Decimal::new(2, 2));
        let fixed = CustomFee::fixed("box", Decimal::from(4));

        assert_eq!(pct.amount_on(Decimal::from(200)), Decimal::from(4));
        assert_eq!(fixed.amount_on(Decimal::from(200)), Decimal::from(4));
    }

    #[rstest]
    #[case(Decimal::new(9999, 2), true)]
    #[case(Decimal::from(100), false)]
    #[case(Decimal::new(10001, 2), false)]
    #[case(Decimal::ZERO, true)]
    fn test_free_shipping_is_strictly_below(#[case] list_price: Decimal, #[case] waived: bool) {
        let fees = FeeModel::zero("test").with_free_shipping_threshold(Decimal::from(100));
        assert_eq!(fees.waives_fixed_fees(list_price), waived);
    }

    #[test]
    fn test_free_shipping_disabled() {
        let disabled = FeeModel::zero("test");
        assert!(!disabled.waives_fixed_fees(Decimal::ONE));
    }

    #[test]
    fn test_pl_override() {
        let pl = PlFeeOverride {
            platform_pct: None,
            marketing_pct: Some(Decimal::new(12, 2)),
            opex_pct: Some(Decimal::new(6, 2)),
        };
        let fees = FeeModel::default().with_pl_override(&pl);

        assert_eq!(fees.platform_pct, Decimal::new(3, 2));
        assert_eq!(fees.marketing_pct, Decimal::new(12, 2));
        assert_eq!(fees.opex_pct, Decimal::new(6, 2));
    }

    #[test]
    fn test_validate() {
        assert!(FeeModel::default().validate().is_ok());

        let bad_discount = FeeModel::default().with_discount_rate(Decimal::ONE);
        assert!(matches!(bad_discount.validate(), Err(CostingError::InvalidDiscount(_))));

        let bad_pct = FeeModel::default().with_percentages(
            Decimal::new(-1, 2),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        assert!(matches!(bad_pct.validate(), Err(CostingError::InvalidFeeModel(_))));

        let bad_fee = FeeModel::default().with_custom_fee(CustomFee::fixed("x", Decimal::from(-5)));
        assert!(bad_fee.validate().is_err());
    }

    #[test]
    fn test_has_no_fees() {
        assert!(FeeModel::zero("empty").has_no_fees());
        assert!(!FeeModel::default().has_no_fees());
    }

    #[test]
    fn test_fee_type_serialization() {
        let fee = CustomFee::percentage("payment", Decimal::new(25, 3));
        let json = serde_json::to_string(&fee).unwrap();
        assert!(json.contains("\"percentage\""));
    }
}
