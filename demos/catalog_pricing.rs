//! 範例：建立目錄、載入通路設定、批次定價與敏感度分析
//!
//! ```text
//! cargo run --example catalog_pricing
//! ```

use cogs_pricing::*;
use rust_decimal::Decimal;

const CHANNELS: &str = r#"{
    "salla": {
        "platform_pct": 0.03,
        "marketing_pct": 0.28,
        "opex_pct": 0.04,
        "vat_rate": 0.15,
        "discount_rate": 0.10,
        "shipping_fixed": 20,
        "preparation_fee": 6,
        "free_shipping_threshold": 0,
        "custom_fees": {
            "payment": {"name": "payment", "amount": 0.025, "fee_type": "percentage"}
        }
    }
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    // 1. 目錄
    let catalog = Catalog::new()
        .with_material(Material::new("OIL-ROSE", Decimal::new(450, 2)).with_unit("ml"))?
        .with_material(Material::new("OIL-OUD", Decimal::new(1200, 2)).with_unit("ml"))?
        .with_material(Material::new("BOTTLE-50", Decimal::new(350, 2)))?
        .with_material(Material::new("GIFT-BOX", Decimal::from(8)))?
        .with_recipe("PERFUME-ROSE", [("OIL-ROSE", Decimal::from(10)), ("BOTTLE-50", Decimal::ONE)])?
        .with_recipe("PERFUME-OUD", [("OIL-OUD", Decimal::from(8)), ("BOTTLE-50", Decimal::ONE)])?
        .with_package(
            "GIFT-SET",
            [("PERFUME-ROSE", Decimal::ONE), ("PERFUME-OUD", Decimal::ONE), ("GIFT-BOX", Decimal::ONE)],
        )?;

    for issue in catalog.integrity_report() {
        println!("資料問題: {}", issue);
    }

    // 2. 通路
    let store = ChannelStore::from_json_str(CHANNELS)?;
    let channel = store.get("salla")?;
    let config = PricingConfig::default();

    // 3. 批次定價
    let report = BatchPricer::new(&catalog, &config).price_all(channel, Decimal::new(15, 2), Decimal::new(10, 2))?;

    println!("\n{:<14} {:>10} {:>10} {:>10} {:>8}  警示", "料號", "成本", "標價", "利潤", "淨利率");
    for row in &report.rows {
        match &row.solved {
            Some(solved) => println!(
                "{:<14} {:>10} {:>10} {:>10} {:>7}%  {}",
                row.sku,
                row.cogs.round_dp(2),
                solved.list_price.round_dp(2),
                solved.breakdown.profit.round_dp(2),
                (solved.breakdown.margin_pct * Decimal::ONE_HUNDRED).round_dp(1),
                row.alert.map(|a| a.message()).unwrap_or("")
            ),
            None => println!("{:<14} 無法定價: {}", row.sku, row.reason.as_deref().unwrap_or("")),
        }
    }

    let summary = report.summary();
    println!("\n已定價 {} / {}，平均淨利率 {:?}", summary.priced, summary.total, summary.average_margin.map(|m| m.round_dp(4)));

    // 4. 敏感度分析
    let fees = channel.clone();
    let solver = PriceSolver::new(&fees, &config)?;
    let gift = report
        .row("GIFT-SET")
        .and_then(|row| row.solved.as_ref())
        .ok_or_else(|| anyhow::anyhow!("GIFT-SET 未定價"))?;

    let sensitivity = SensitivityAnalyzer::analyze(&solver, gift.breakdown.cogs, gift.list_price)?;
    println!("\n成本變動對利潤的影響 (GIFT-SET)");
    for point in &sensitivity.cogs_sensitivity {
        println!(
            "{:>6}%  成本 {:>8}  利潤 {:>8}",
            (point.change_pct * Decimal::ONE_HUNDRED).round_dp(0),
            point.cogs.round_dp(2),
            point.profit.round_dp(2)
        );
    }

    Ok(())
}
