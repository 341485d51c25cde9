use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sales_data_processing::analysis::{run_map_reduce, Operation, TrendOptions};
use sales_data_processing::execution::ExecutionOptions;
use sales_data_processing::types::{DataSet, Record};

const COUNTRIES: [&str; 5] = ["USA", "Canada", "Germany", "Japan", "Kenya"];
const ITEMS: [&str; 6] = ["Fruits", "Meat", "Cereal", "Snacks", "Beverages", "Office Supplies"];

fn dataset(rows: usize) -> DataSet {
    (0..rows)
        .map(|i| {
            let date = NaiveDate::from_ymd_opt(2015 + (i % 8) as i32, 1 + (i % 12) as u32, 1 + (i % 28) as u32)
                .unwrap();
            Record::new(COUNTRIES[i % COUNTRIES.len()], (i % 1000) as f64)
                .with_region(if i % 2 == 0 { "North America" } else { "Europe" })
                .with_item_type(ITEMS[i % ITEMS.len()])
                .with_order_date(date)
                .with_units_sold((1 + i % 50) as f64)
                .with_unit_price(10.0)
                .with_unit_cost(6.0)
                .with_total_revenue((10 * (1 + i % 50)) as f64)
        })
        .collect()
}

fn bench_operations(c: &mut Criterion) {
    let ds = dataset(200_000);
    let ops = [
        Operation::CompareProfit {
            first: "USA".to_string(),
            second: "Canada".to_string(),
        },
        Operation::YearlyTrend(TrendOptions::default()),
        Operation::ProfitByRegion,
    ];

    let mut group = c.benchmark_group("map_reduce");
    for op in &ops {
        for workers in [1, 4] {
            let opts = ExecutionOptions::with_workers(workers);
            group.bench_with_input(BenchmarkId::new(op.name(), workers), &opts, |b, opts| {
                b.iter(|| run_map_reduce(black_box(&ds), op, opts).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_operations);
criterion_main!(benches);
