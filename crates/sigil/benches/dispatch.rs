use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use sigil::Signal;

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    for observers in [1usize, 16, 256] {
        let signal = Signal::<u64>::new();
        let handles: Vec<_> = (0..observers)
            .map(|_| {
                signal
                    .connect(|value| {
                        black_box(*value);
                    })
                    .unwrap()
            })
            .collect();
        group.bench_function(format!("{observers}_observers"), |b| {
            b.iter(|| signal.emit(black_box(&7)));
        });
        drop(handles);
    }
    group.finish();
}

fn bench_cull(c: &mut Criterion) {
    c.bench_function("cull_half_dead_256", |b| {
        b.iter_batched(
            || {
                let signal = Signal::<()>::new();
                let handles: Vec<_> = (0..256)
                    .filter_map(|index| {
                        let handle = signal.connect(|_| {})?;
                        (index % 2 == 0).then_some(handle)
                    })
                    .collect();
                (signal, handles)
            },
            |(signal, handles)| {
                black_box(signal.cull_dead_observers());
                drop(handles);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_emit, bench_cull);
criterion_main!(benches);
