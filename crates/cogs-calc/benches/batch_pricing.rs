use cogs_calc::{BatchItem, BatchPricer, CostResolver};
use cogs_core::{Catalog, FeeModel, Material, PricingConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// 隨機目錄：原物料、產品（3~6 種原物料）、兩層組合包
fn synthetic_catalog(products: usize) -> Catalog {
    let mut rng = StdRng::seed_from_u64(42);
    let mut catalog = Catalog::new();

    let materials = products / 2 + 10;
    for i in 0..materials {
        let cost = Decimal::new(rng.gen_range(50..5_000i64), 2);
        catalog
            .upsert_material(Material::new(format!("MAT-{:05}", i), cost))
            .unwrap();
    }

    for i in 0..products {
        let lines = rng.gen_range(3..=6);
        let recipe = (0..lines)
            .map(|_| {
                (
                    format!("MAT-{:05}", rng.gen_range(0..materials)),
                    Decimal::new(rng.gen_range(1..40i64), 1),
                )
            })
            .collect();
        catalog.upsert_recipe(format!("PRD-{:05}", i), recipe).unwrap();
    }

    for i in 0..products / 4 {
        let composition = (0..3)
            .map(|_| (format!("PRD-{:05}", rng.gen_range(0..products)), Decimal::from(rng.gen_range(1..4i64))))
            .collect();
        catalog.upsert_package(format!("PKG-{:05}", i), composition).unwrap();
    }

    for i in 0..products / 20 {
        let composition = (0..2)
            .map(|_| (format!("PKG-{:05}", rng.gen_range(0..products / 4)), Decimal::ONE))
            .collect();
        catalog.upsert_package(format!("BDL-{:05}", i), composition).unwrap();
    }

    catalog
}

fn bench_resolve_all(c: &mut Criterion) {
    let catalog = synthetic_catalog(2_000);

    c.bench_function("resolve_all_2000", |b| {
        b.iter(|| {
            let mut resolver = CostResolver::new(black_box(&catalog), 64);
            resolver.resolve_all()
        })
    });
}

fn bench_batch_pricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_pricing");
    let channel = FeeModel::default().with_channel_name("bench");

    for size in [100usize, 1_000] {
        let catalog = synthetic_catalog(size);
        let items: Vec<BatchItem> = catalog.sellable_skus().into_iter().map(BatchItem::from).collect();

        for parallel in [false, true] {
            let config = PricingConfig::default().with_parallel_batch(parallel);
            let label = if parallel { "parallel" } else { "sequential" };

            group.bench_with_input(BenchmarkId::new(label, size), &items, |b, items| {
                let pricer = BatchPricer::new(&catalog, &config);
                b.iter(|| {
                    pricer
                        .price_catalog(&channel, Decimal::new(20, 2), Decimal::new(10, 2), black_box(items))
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_resolve_all, bench_batch_pricing);
criterion_main!(benches);
