use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use turnstile::FixedWindow;
use turnstile::LeakyBucket;
use turnstile::Limiter;
use turnstile::SlidingWindow;
use turnstile::TokenBucket;

fn bench_single_limiter<L: Limiter>(group_name: &str, c: &mut Criterion, limiter: Arc<L>) {
    let mut group = c.benchmark_group(group_name);

    group.bench_function("single-threaded", |b| {
        b.iter(|| {
            let _ = black_box(limiter.as_ref()).allow();
        })
    });

    group.finish();
}

fn bench_parallel_limiter<L: Limiter + 'static>(
    group_name: &str,
    c: &mut Criterion,
    limiter: Arc<L>,
) {
    let mut group = c.benchmark_group(group_name);

    for threads in [2, 4, 8].iter() {
        let num_threads = *threads;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}-threads", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter_custom(|iters| {
                    let barrier = Arc::new(Barrier::new(n + 1));
                    let mut handles = Vec::with_capacity(n);

                    for _ in 0..n {
                        let l = Arc::clone(&limiter);
                        let bar = Arc::clone(&barrier);
                        let iters_per_thread = iters / n as u64;

                        handles.push(thread::spawn(move || {
                            bar.wait(); // Wait for the start signal
                            for _ in 0..iters_per_thread {
                                let _ = black_box(l.allow());
                            }
                        }));
                    }

                    // Synchronize the start across all threads
                    barrier.wait();
                    let start = Instant::now();

                    for handle in handles {
                        let _ = handle.join();
                    }

                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

fn bench_dynamic_limiter(group_name: &str, c: &mut Criterion, limiter: Arc<dyn Limiter>) {
    let mut group = c.benchmark_group(format!("Dynamic-{}", group_name));

    group.bench_function("single-threaded", |b| {
        b.iter(|| {
            let _ = black_box(limiter.as_ref()).allow();
        })
    });

    group.finish();
}

fn run_all_benches(c: &mut Criterion) {
    // Drives the leaky bucket's drain task for the duration of the run
    let rt = tokio::runtime::Runtime::new().unwrap();

    let limit = NonZeroUsize::new(100_000).unwrap();
    let period = Duration::from_secs(1);
    let rate = limit.get() as f64;

    let fw = Arc::new(FixedWindow::new(limit, period).unwrap());
    let sw = Arc::new(SlidingWindow::new(limit, period).unwrap());
    let tb = Arc::new(TokenBucket::new(rate, limit).unwrap());
    let lb = Arc::new(LeakyBucket::with_handle(rate, limit, rt.handle()).unwrap());

    bench_single_limiter("FixedWindow-Static", c, Arc::clone(&fw));
    bench_parallel_limiter("FixedWindow-Static", c, fw.clone());

    bench_single_limiter("SlidingWindow-Static", c, Arc::clone(&sw));
    bench_parallel_limiter("SlidingWindow-Static", c, sw.clone());

    bench_single_limiter("TokenBucket-Static", c, Arc::clone(&tb));
    bench_parallel_limiter("TokenBucket-Static", c, tb.clone());

    bench_single_limiter("LeakyBucket-Static", c, Arc::clone(&lb));
    bench_parallel_limiter("LeakyBucket-Static", c, lb.clone());

    // The overhead of Arc<dyn Limiter>
    let limiters: Vec<(&str, Arc<dyn Limiter>)> = vec![
        ("FixedWindow", fw),
        ("SlidingWindow", sw),
        ("TokenBucket", tb),
        ("LeakyBucket", lb),
    ];

    for (name, limiter) in limiters {
        bench_dynamic_limiter(name, c, limiter);
    }
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
