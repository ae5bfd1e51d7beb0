//! 批次定價

use chrono::{DateTime, Utc};
use cogs_core::{Catalog, CostingError, FeeModel, ItemKind, PricingConfig, Result};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::alerts::MarginAlert;
use crate::resolver::{CostResolver, CostStatus, ResolvedCost};
use crate::solver::{PriceSolver, SolvedPrice};
use crate::PricingWarning;

/// 批次定價項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub sku: String,
    /// 覆蓋批次的目標毛利
    pub target_margin: Option<Decimal>,
}

impl BatchItem {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            target_margin: None,
        }
    }

    /// 建構器模式：設置此項目的目標毛利
    pub fn with_target_margin(mut self, margin: Decimal) -> Self {
        self.target_margin = Some(margin);
        self
    }
}

impl From<&str> for BatchItem {
    fn from(sku: &str) -> Self {
        Self::new(sku)
    }
}

impl From<String> for BatchItem {
    fn from(sku: String) -> Self {
        Self::new(sku)
    }
}

/// 單列定價狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    /// 已定價
    Priced,
    /// 目標毛利或折扣在此費率下無法達成
    Infeasible,
    /// 成本無法解析（料號不存在、循環引用、巢狀過深）
    Unresolved,
}

/// 批次定價結果列
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingRow {
    pub sku: String,
    pub kind: Option<ItemKind>,
    pub cogs: Decimal,
    pub cost_status: CostStatus,
    pub target_margin: Decimal,
    pub status: RowStatus,
    pub solved: Option<SolvedPrice>,
    pub alert: Option<MarginAlert>,
    /// 未定價原因，或已定價但成本不完整的提示
    pub reason: Option<String>,
}

impl PricingRow {
    pub fn is_priced(&self) -> bool {
        self.status == RowStatus::Priced
    }

    pub fn list_price(&self) -> Option<Decimal> {
        self.solved.as_ref().map(|s| s.list_price)
    }

    pub fn profit(&self) -> Option<Decimal> {
        self.solved.as_ref().map(|s| s.breakdown.profit)
    }

    pub fn margin_pct(&self) -> Option<Decimal> {
        self.solved.as_ref().map(|s| s.breakdown.margin_pct)
    }
}

/// 批次定價報表
#[derive(Debug, Clone, Serialize)]
pub struct PricingReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub channel: String,
    pub target_margin: Decimal,
    pub discount_rate: Decimal,
    /// 與輸入順序一致
    pub rows: Vec<PricingRow>,
    pub warnings: Vec<PricingWarning>,
    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u128>,
}

/// 批次統計
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub priced: usize,
    pub infeasible: usize,
    pub unresolved: usize,
    pub losses: usize,
    pub below_minimum: usize,
    pub below_recommended: usize,
    pub excellent: usize,
    /// 已定價列的平均淨利率
    pub average_margin: Option<Decimal>,
}

impl PricingReport {
    /// 添加警告
    pub fn add_warning(&mut self, warning: PricingWarning) {
        self.warnings.push(warning);
    }

    pub fn row(&self, sku: &str) -> Option<&PricingRow> {
        self.rows.iter().find(|r| r.sku == sku)
    }

    /// 未定價的列
    pub fn failed_rows(&self) -> impl Iterator<Item = &PricingRow> {
        self.rows.iter().filter(|r| !r.is_priced())
    }

    pub fn summary(&self) -> BatchSummary {
        let count_status = |status: RowStatus| self.rows.iter().filter(|r| r.status == status).count();
        let count_alert = |alert: MarginAlert| {
            self.rows
                .iter()
                .filter(|r| r.alert == Some(alert))
                .count()
        };

        let margins: Vec<Decimal> = self
            .rows
            .iter()
            .filter(|r| r.is_priced())
            .filter_map(|r| r.margin_pct())
            .collect();
        let average_margin = margins
            .iter()
            .try_fold(Decimal::ZERO, |acc, &m| acc.checked_add(m))
            .and_then(|total| total.checked_div(Decimal::from(margins.len())));

        BatchSummary {
            total: self.rows.len(),
            priced: count_status(RowStatus::Priced),
            infeasible: count_status(RowStatus::Infeasible),
            unresolved: count_status(RowStatus::Unresolved),
            losses: count_alert(MarginAlert::Loss),
            below_minimum: count_alert(MarginAlert::BelowMinimum),
            below_recommended: count_alert(MarginAlert::BelowRecommended),
            excellent: count_alert(MarginAlert::Excellent),
            average_margin,
        }
    }
}

/// 批次定價器
pub struct BatchPricer<'a> {
    catalog: &'a Catalog,
    config: &'a PricingConfig,
}

impl<'a> BatchPricer<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a PricingConfig) -> Self {
        Self { catalog, config }
    }

    /// 對目錄中所有產品與組合包定價
    pub fn price_all(
        &self,
        channel: &FeeModel,
        target_margin: Decimal,
        discount_rate: Decimal,
    ) -> Result<PricingReport> {
        let items: Vec<BatchItem> = self
            .catalog
            .sellable_skus()
            .into_iter()
            .map(BatchItem::from)
            .collect();
        self.price_catalog(channel, target_margin, discount_rate, &items)
    }

    /// 批次定價
    ///
    /// 單一項目的失敗（無法達成的毛利、無法解析的成本）記錄在該列，不中斷批次；
    /// 折扣率超出上限或費用模型不合法則整批失敗。
    pub fn price_catalog(
        &self,
        channel: &FeeModel,
        target_margin: Decimal,
        discount_rate: Decimal,
        items: &[BatchItem],
    ) -> Result<PricingReport> {
        tracing::info!(
            "開始批次定價：通路 {}，項目 {} 筆，目標毛利 {}，折扣 {}",
            channel.channel_name,
            items.len(),
            target_margin,
            discount_rate
        );

        let start_time = std::time::Instant::now();

        // Step 1: 檢查折扣與費用模型
        if discount_rate < Decimal::ZERO || discount_rate >= Decimal::ONE {
            return Err(CostingError::InvalidDiscount(discount_rate));
        }
        if discount_rate > self.config.max_discount_rate {
            return Err(CostingError::InvalidInput(format!(
                "折扣率 {} 超過上限 {}",
                discount_rate, self.config.max_discount_rate
            )));
        }
        let fees = channel.clone().with_discount_rate(discount_rate);
        let solver = PriceSolver::new(&fees, self.config)?;

        let mut report = PricingReport {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            channel: fees.channel_name.clone(),
            target_margin,
            discount_rate,
            rows: Vec::with_capacity(items.len()),
            warnings: Vec::new(),
            calculation_time_ms: None,
        };

        if fees.has_no_fees() {
            report.add_warning(PricingWarning::warning(
                String::new(),
                format!("通路 {} 未設定任何費用", fees.channel_name),
            ));
        }

        // Step 2: 成本展開（每次請求使用獨立的記憶化快取）
        tracing::debug!("Step 2: 成本展開");
        let mut resolver = CostResolver::new(self.catalog, self.config.max_resolution_depth);
        let costs: Vec<ResolvedCost> = items
            .iter()
            .map(|item| resolver.resolve_cost(&item.sku, None))
            .collect();
        for issue in resolver.issues() {
            report.add_warning(PricingWarning::warning(issue.sku().to_string(), issue.to_string()));
        }

        // Step 3: 逐項反推標價
        tracing::debug!("Step 3: 反推標價");
        let price_one = |(item, cost): (&BatchItem, &ResolvedCost)| {
            self.price_row(&solver, item, cost, target_margin)
        };
        report.rows = if self.config.parallel_batch {
            items.par_iter().zip(costs.par_iter()).map(price_one).collect()
        } else {
            items.iter().zip(costs.iter()).map(price_one).collect()
        };

        let elapsed = start_time.elapsed().as_millis();
        report.calculation_time_ms = Some(elapsed);

        let summary = report.summary();
        tracing::info!(
            "批次定價完成：已定價 {}，無法達成 {}，成本無法解析 {}，耗時 {} ms",
            summary.priced,
            summary.infeasible,
            summary.unresolved,
            elapsed
        );

        Ok(report)
    }

    fn price_row(
        &self,
        solver: &PriceSolver<'_>,
        item: &BatchItem,
        cost: &ResolvedCost,
        batch_margin: Decimal,
    ) -> PricingRow {
        let target_margin = item.target_margin.unwrap_or(batch_margin);
        let mut row = PricingRow {
            sku: item.sku.clone(),
            kind: cost.kind,
            cogs: cost.cost,
            cost_status: cost.status,
            target_margin,
            status: RowStatus::Unresolved,
            solved: None,
            alert: None,
            reason: None,
        };

        if !cost.status.is_authoritative() {
            let reason = match cost.status {
                CostStatus::Missing => "料號不存在於目錄",
                CostStatus::Cyclic => "組合包存在循環引用，成本無法計算",
                CostStatus::Overflow => "成本超出數值範圍，無法計算",
                _ => "組合包巢狀層數超過上限，成本無法計算",
            };
            tracing::warn!("料號 {} 無法定價: {}", item.sku, reason);
            row.reason = Some(reason.to_string());
            return row;
        }

        match solver.solve(cost.cost, target_margin) {
            Ok(solved) if solved.breakdown.is_degenerate() => {
                tracing::warn!("料號 {} 成本與固定費用皆為 0，無法反推標價", item.sku);
                row.status = RowStatus::Infeasible;
                row.reason = Some("成本與固定費用皆為 0，無法反推標價".to_string());
            }
            Ok(solved) if !solved.converged => {
                let reason = format!(
                    "免運門檻使目標毛利無法精確達成：最接近的標價 {} 的淨利率為 {}",
                    solved.list_price.round_dp(2),
                    solved.breakdown.margin_pct.round_dp(4)
                );
                tracing::warn!("料號 {} {}", item.sku, reason);
                row.status = RowStatus::Infeasible;
                row.reason = Some(reason);
                row.solved = Some(solved);
            }
            Ok(solved) => {
                row.alert = MarginAlert::classify(
                    solved.breakdown.profit,
                    solved.breakdown.margin_pct,
                    self.config,
                );
                if cost.status == CostStatus::Incomplete {
                    row.reason = Some("部分子件缺漏並以 0 計入，成本可能偏低".to_string());
                }
                row.status = RowStatus::Priced;
                row.solved = Some(solved);
            }
            Err(err) => {
                tracing::warn!("料號 {} 無法定價: {}", item.sku, err);
                row.status = RowStatus::Infeasible;
                row.reason = Some(err.to_string());
            }
        }

        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogs_core::Material;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_material(Material::new("MAT-A", Decimal::from(10)))
            .unwrap()
            .with_recipe("PRD-1", [("MAT-A", Decimal::from(3))])
            .unwrap()
            .with_recipe("PRD-2", [("MAT-A", Decimal::ONE), ("MAT-GONE", Decimal::ONE)])
            .unwrap()
            .with_package("PKG-1", [("PRD-1", Decimal::from(2))])
            .unwrap()
            .with_package("LOOP-A", [("LOOP-B", Decimal::ONE)])
            .unwrap()
            .with_package("LOOP-B", [("LOOP-A", Decimal::ONE)])
            .unwrap()
    }

    fn channel() -> FeeModel {
        FeeModel::zero("test")
            .with_percentages(Decimal::new(10, 2), Decimal::new(10, 2), Decimal::ZERO)
            .with_fixed_fees(Decimal::from(5), Decimal::ZERO)
    }

    #[test]
    fn test_batch_rows_follow_input_order() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);

        let items: Vec<BatchItem> = ["PKG-1", "NOPE", "PRD-1", "LOOP-A"]
            .into_iter()
            .map(BatchItem::from)
            .collect();
        let report = pricer
            .price_catalog(&channel(), Decimal::new(15, 2), Decimal::ZERO, &items)
            .unwrap();

        let skus: Vec<&str> = report.rows.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["PKG-1", "NOPE", "PRD-1", "LOOP-A"]);

        assert_eq!(report.rows[0].status, RowStatus::Priced);
        assert_eq!(report.rows[0].cogs, Decimal::from(60));
        assert_eq!(report.rows[1].status, RowStatus::Unresolved);
        assert!(report.rows[1].reason.is_some());
        assert_eq!(report.rows[3].status, RowStatus::Unresolved);
        assert_eq!(report.rows[3].cost_status, CostStatus::Cyclic);
    }

    #[test]
    fn test_cost_overflow_row_does_not_abort_batch() {
        let catalog = catalog()
            .with_material(Material::new("MAT-BIG", Decimal::MAX))
            .unwrap()
            .with_recipe("PRD-HUGE", [("MAT-BIG", Decimal::from(2))])
            .unwrap();
        let config = PricingConfig::default().with_parallel_batch(true);
        let pricer = BatchPricer::new(&catalog, &config);

        let items: Vec<BatchItem> = ["PRD-HUGE", "PRD-1"].into_iter().map(BatchItem::from).collect();
        let report = pricer
            .price_catalog(&channel(), Decimal::new(15, 2), Decimal::ZERO, &items)
            .unwrap();

        assert_eq!(report.rows[0].status, RowStatus::Unresolved);
        assert_eq!(report.rows[0].cost_status, CostStatus::Overflow);
        assert!(report.rows[0].reason.is_some());
        assert_eq!(report.rows[1].status, RowStatus::Priced);
    }

    #[test]
    fn test_unconverged_threshold_row_has_own_reason() {
        // 成本 0、運費 20、免運門檻 100：目標毛利 20% 無精確解
        let catalog = Catalog::new()
            .with_recipe("PRD-FREE", Vec::<(String, Decimal)>::new())
            .unwrap();
        let fees = FeeModel::zero("threshold")
            .with_fixed_fees(Decimal::from(20), Decimal::ZERO)
            .with_free_shipping_threshold(Decimal::from(100));
        let config = PricingConfig::default();

        let report = BatchPricer::new(&catalog, &config)
            .price_all(&fees, Decimal::new(20, 2), Decimal::ZERO)
            .unwrap();

        let row = report.row("PRD-FREE").unwrap();
        assert_eq!(row.status, RowStatus::Infeasible);
        let reason = row.reason.as_deref().unwrap();
        assert!(reason.contains("免運門檻"), "{}", reason);
        assert!(!reason.contains("皆為 0"));
        assert!(row.solved.as_ref().is_some_and(|s| !s.converged));
    }

    #[test]
    fn test_infeasible_item_does_not_abort_batch() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);

        let items = vec![
            BatchItem::new("PRD-1"),
            BatchItem::new("PKG-1").with_target_margin(Decimal::new(90, 2)),
        ];
        let report = pricer
            .price_catalog(&channel(), Decimal::new(15, 2), Decimal::ZERO, &items)
            .unwrap();

        assert!(report.rows[0].is_priced());
        assert_eq!(report.rows[1].status, RowStatus::Infeasible);
        assert!(report.rows[1].reason.as_deref().unwrap_or("").contains("目標毛利無法達成"));

        let summary = report.summary();
        assert_eq!(summary.priced, 1);
        assert_eq!(summary.infeasible, 1);
    }

    #[test]
    fn test_priced_rows_hit_target_and_alert() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);

        let report = pricer
            .price_all(&channel(), Decimal::new(175, 3), Decimal::ZERO)
            .unwrap();

        let row = report.row("PRD-1").unwrap();
        // (30 + 5) / (1 − 0.2 − 0.175) = 56
        assert_eq!(row.list_price(), Some(Decimal::from(56)));
        assert_eq!(row.margin_pct(), Some(Decimal::new(175, 3)));
        assert_eq!(row.alert, None);

        // 缺漏原物料的產品仍定價，但附帶提示
        let partial = report.row("PRD-2").unwrap();
        assert!(partial.is_priced());
        assert_eq!(partial.cost_status, CostStatus::Incomplete);
        assert!(partial.reason.is_some());

        assert!(report.warnings.iter().any(|w| w.sku == "PRD-2"));
        assert_eq!(report.summary().unresolved, 2);
    }

    #[test]
    fn test_excessive_discount_aborts_batch() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);
        let items = vec![BatchItem::new("PRD-1")];

        let too_high = pricer.price_catalog(&channel(), Decimal::new(15, 2), Decimal::new(60, 2), &items);
        assert!(matches!(too_high, Err(CostingError::InvalidInput(_))));

        let invalid = pricer.price_catalog(&channel(), Decimal::new(15, 2), Decimal::ONE, &items);
        assert!(matches!(invalid, Err(CostingError::InvalidDiscount(_))));
    }

    #[test]
    fn test_discount_override_is_applied() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);
        let items = vec![BatchItem::new("PRD-1")];

        let plain = pricer
            .price_catalog(&channel(), Decimal::new(15, 2), Decimal::ZERO, &items)
            .unwrap();
        let discounted = pricer
            .price_catalog(&channel(), Decimal::new(15, 2), Decimal::new(20, 2), &items)
            .unwrap();

        assert!(discounted.rows[0].list_price().unwrap() > plain.rows[0].list_price().unwrap());
        assert_eq!(discounted.rows[0].solved.as_ref().unwrap().breakdown.discount_rate, Decimal::new(20, 2));
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let catalog = catalog();
        let parallel = PricingConfig::default();
        let sequential = PricingConfig::default().with_parallel_batch(false);

        let a = BatchPricer::new(&catalog, &parallel)
            .price_all(&channel(), Decimal::new(20, 2), Decimal::new(10, 2))
            .unwrap();
        let b = BatchPricer::new(&catalog, &sequential)
            .price_all(&channel(), Decimal::new(20, 2), Decimal::new(10, 2))
            .unwrap();

        assert_eq!(a.rows, b.rows);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_channel_without_fees_warns() {
        let catalog = catalog();
        let config = PricingConfig::default();
        let pricer = BatchPricer::new(&catalog, &config);

        let report = pricer
            .price_catalog(&FeeModel::zero("bare"), Decimal::new(15, 2), Decimal::ZERO, &[BatchItem::new("PRD-1")])
            .unwrap();

        assert!(report.warnings.iter().any(|w| w.message.contains("未設定任何費用")));
        assert!(report.rows[0].is_priced());
    }
}
