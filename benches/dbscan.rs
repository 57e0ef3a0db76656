use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use geocluster::Cluster as _;

mod generator;

const SAMPLE_SIZE: usize = 5000;

fn build_pool(thread_count: usize, core_count: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .spawn_handler(|thread| {
            let mut b = std::thread::Builder::new();
            if let Some(name) = thread.name() {
                b = b.name(name.to_owned());
            }
            if let Some(stack_size) = thread.stack_size() {
                b = b.stack_size(stack_size);
            }
            b.spawn(move || {
                let core_idx = thread.index() % core_count;
                core_affinity::set_for_current(core_affinity::CoreId { id: core_idx });
                thread.run();
            })?;
            Ok(())
        })
        .build()
        .unwrap()
}

pub fn bench(c: &mut Criterion) {
    // Roughly a 50km by 50km area.
    let points = generator::uniform_box((45.0, 45.45), (5.0, 5.64), SAMPLE_SIZE);
    let mut labels: Vec<geocluster::Label> = vec![None; points.len()];
    let radius = geocluster::km_to_radians(1.0);

    let core_count = num_cpus::get();

    let mut group = c.benchmark_group("dbscan");
    for thread_count in [1, 2, 4, 8, 16] {
        let pool = build_pool(thread_count, core_count);
        group.bench_function(&thread_count.to_string(), |b| {
            pool.install(|| {
                b.iter(|| {
                    geocluster::Dbscan {
                        radius,
                        min_points: 5,
                    }
                    .cluster(black_box(&mut labels), black_box(points.as_slice()))
                })
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("optics");
    group.sample_size(10);
    for thread_count in [1, 4, 16] {
        let pool = build_pool(thread_count, core_count);
        group.bench_function(&thread_count.to_string(), |b| {
            pool.install(|| {
                b.iter(|| {
                    geocluster::Optics {
                        max_radius: radius,
                        min_points: 5,
                        ..Default::default()
                    }
                    .cluster(black_box(&mut labels), black_box(points.as_slice()))
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
