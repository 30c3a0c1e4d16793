use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use ray_adjust::{FnHost, Host, OptimizationSession, Orchestrator, SolverOptions};

fn solver_options(verbose: bool) -> SolverOptions {
    SolverOptions {
        max_iters: 200,
        verbose,
        ..SolverOptions::default()
    }
}

fn solve<F>(params: &[f64], npts: usize, f: F, options: &SolverOptions) -> Vec<f64>
where
    F: FnMut(&[f64], &mut [f64]) -> bool,
{
    let session = OptimizationSession::new();
    let host = FnHost::new(params.to_vec(), npts, f);
    let mut adjuster = Orchestrator::new(&session, host, options.clone()).expect("setup");
    adjuster.run(None);
    adjuster.into_host().params().to_vec()
}

fn bench_line_fit(c: &mut Criterion) {
    let xs: Vec<f64> = (0..32).map(|i| i as f64 * 0.25).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 1.5 * x - 0.75 + 0.01 * (x * 7.0).sin()).collect();
    let opts_verbose = solver_options(true);
    let opts_quiet = solver_options(false);
    let mut first = true;
    c.bench_function("line_fit", |b| {
        b.iter(|| {
            let opts = if first {
                first = false;
                &opts_verbose
            } else {
                &opts_quiet
            };
            let p = solve(
                &[0.0, 0.0],
                xs.len(),
                |p: &[f64], r: &mut [f64]| {
                    for ((out, x), y) in r.iter_mut().zip(&xs).zip(&ys) {
                        *out = p[0] * x + p[1] - y;
                    }
                    true
                },
                opts,
            );
            black_box(&p);
        });
    });
}

fn bench_rosenbrock(c: &mut Criterion) {
    let opts = solver_options(false);
    c.bench_function("rosenbrock", |b| {
        b.iter(|| {
            let p = solve(
                &[-1.2, 1.0],
                2,
                |p: &[f64], r: &mut [f64]| {
                    r[0] = 10.0 * (p[1] - p[0] * p[0]);
                    r[1] = 1.0 - p[0];
                    true
                },
                &opts,
            );
            black_box(&p);
        });
    });
}

fn bench_exponential_mixture(c: &mut Criterion) {
    const TERMS: usize = 6;
    let ts: Vec<f64> = (0..120).map(|i| i as f64 * 0.05).collect();
    let truth: Vec<f64> = (0..TERMS)
        .flat_map(|k| [1.0 / (k + 1) as f64, 0.3 * (k + 1) as f64])
        .collect();
    let model = |p: &[f64], t: f64| -> f64 {
        p.chunks(2).map(|ab| ab[0] * (-ab[1] * t).exp()).sum()
    };
    let data: Vec<f64> = ts.iter().map(|&t| model(&truth[..], t)).collect();
    let start: Vec<f64> = truth.iter().map(|v| v * 1.2).collect();
    let opts = solver_options(false);
    c.bench_function("exponential_mixture", |b| {
        b.iter(|| {
            let p = solve(
                &start,
                ts.len(),
                |p: &[f64], r: &mut [f64]| {
                    for ((out, &t), d) in r.iter_mut().zip(&ts).zip(&data) {
                        *out = model(p, t) - d;
                    }
                    true
                },
                &opts,
            );
            black_box(&p);
        });
    });
}

fn bench_jacobian_build(c: &mut Criterion) {
    const NADJ: usize = 24;
    const NPTS: usize = 240;
    let mut host = FnHost::new(vec![0.5; NADJ], NPTS, |p: &[f64], r: &mut [f64]| {
        for (i, out) in r.iter_mut().enumerate() {
            let a = p[i % NADJ];
            let b = p[(i * 7 + 3) % NADJ];
            *out = a * b.cos() - (i as f64) * 1e-3;
        }
        true
    });
    host.perform_residual();
    c.bench_function("jacobian_build", |b| {
        b.iter(|| {
            black_box(host.build_jacobian());
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_millis(1000));
    targets =
        bench_line_fit,
        bench_rosenbrock,
        bench_exponential_mixture,
        bench_jacobian_build
}
criterion_main!(benches);
