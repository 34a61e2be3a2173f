use blobkeep::core::{decide, diff, plan_transfers, ContentHash, FileProperties, ReconcilePolicy};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;

fn props(seed: u64, offset_secs: i64) -> FileProperties {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    FileProperties {
        hash: Some(ContentHash::from_bytes(bytes)),
        size: 1024 + seed,
        modified: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + Duration::seconds(offset_secs),
    }
}

fn bench_decide(c: &mut Criterion) {
    let source = props(1, 60);
    let destination = props(2, 0);
    let policy = ReconcilePolicy::updating();

    c.bench_function("decide_diverged", |b| {
        b.iter(|| decide(black_box(&source), black_box(Some(&destination)), &policy))
    });
}

fn bench_folder_diff(c: &mut Criterion) {
    // 1000 个文件：一半一致，四分之一本地更新，四分之一仅本地存在
    let mut local = HashMap::new();
    let mut remote = HashMap::new();
    for i in 0u64..1000 {
        let path = format!("data/file_{i:04}.csv");
        match i % 4 {
            0 | 1 => {
                local.insert(path.clone(), props(i, 0));
                remote.insert(path, props(i, -60));
            }
            2 => {
                local.insert(path.clone(), props(i, 60));
                remote.insert(path, props(i + 10_000, 0));
            }
            _ => {
                local.insert(path, props(i, 0));
            }
        }
    }

    c.bench_function("diff_1000", |b| {
        b.iter(|| diff(black_box(&local), black_box(&remote)))
    });

    let entries = diff(&local, &remote);
    let policy = ReconcilePolicy::updating();
    c.bench_function("plan_transfers_1000", |b| {
        b.iter(|| plan_transfers(black_box(&entries), &policy).unwrap())
    });
}

criterion_group!(benches, bench_decide, bench_folder_diff);
criterion_main!(benches);
