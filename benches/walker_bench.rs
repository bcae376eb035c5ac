//! Benchmarks for parwalk
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parwalk::pool::queue::{Comparator, HeapBuf, RingBuf};
use parwalk::{DirEntry, Visitor, WalkOptions, Walker};
use std::fs::{self, Metadata};
use std::path::Path;
use std::sync::Arc;

fn benchmark_queue_operations(c: &mut Criterion) {
    c.bench_function("ring_push_pop", |b| {
        let mut ring = RingBuf::with_capacity(1024);
        b.iter(|| {
            ring.push(black_box(42u64));
            black_box(ring.pop());
        })
    });

    c.bench_function("heap_push_pop_64", |b| {
        let cmp: Comparator<u64> = Box::new(|a, b| a.cmp(b));
        let mut heap = HeapBuf::new(cmp);
        for i in 0..64u64 {
            heap.push(i);
        }
        b.iter(|| {
            heap.push(black_box(32));
            black_box(heap.pop());
        })
    });
}

struct CountFiles;

impl Visitor for CountFiles {
    type Data = u64;
    type Token = ();

    fn enter_dir(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<()> {
        Some(())
    }

    fn visit_file(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<u64> {
        Some(1)
    }

    fn exit_dir(
        &self,
        _: &Path,
        _: &Metadata,
        _: (),
        entries: Vec<DirEntry<u64>>,
    ) -> Option<u64> {
        Some(entries.iter().filter_map(|e| e.data).sum())
    }
}

fn benchmark_traversal(c: &mut Criterion) {
    let tmp = tempfile::tempdir().expect("tempdir");
    for d in 0..16 {
        let dir = tmp.path().join(format!("d{d}"));
        fs::create_dir(&dir).expect("mkdir");
        for f in 0..32 {
            fs::write(dir.join(format!("f{f}")), b"bench").expect("write");
        }
    }

    c.bench_function("walk_512_files", |b| {
        let options = WalkOptions {
            threads: 4,
            sort: true,
            ..WalkOptions::default()
        };
        b.iter(|| {
            let count = Walker::new(options.clone())
                .run(tmp.path(), Arc::new(CountFiles))
                .expect("walk");
            black_box(count);
        })
    });
}

criterion_group!(benches, benchmark_queue_operations, benchmark_traversal);
criterion_main!(benches);
