// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::*;
use ndarray::Array2;

use ccdcal::cte::model::{build_scale_map, inverse_forward_model, smooth_read_noise};
use ccdcal::cte::{ColumnScale, CteOptions, CteParams, TrailProfiles, TrapTable};

fn uniform_scales(ncols: usize) -> Vec<ColumnScale> {
    (0..ncols)
        .map(|_| ColumnScale {
            at_512: 1.0,
            at_1024: 1.0,
            at_1536: 1.0,
            at_2048: 1.0,
        })
        .collect()
}

fn sample_params() -> CteParams {
    CteParams {
        cte_name: "bench".into(),
        cte_ver: "1".into(),
        ctedate0: 55000.0,
        ctedate1: 55500.0,
        pctetlen: 60,
        pcternoi: 2.5,
        pctenfor: 5,
        pctenpar: 5,
        pctensmd: 0,
        pctetrsh: -10.0,
        fixrocr: true,
    }
}

fn sample_traps() -> TrapTable {
    TrapTable::from_rows(&[(50000.0, 0.3), (20000.0, 0.2), (5000.0, 0.1)])
}

fn sample_profiles() -> TrailProfiles {
    let trail_len = 60;
    TrailProfiles {
        rprof: Array2::from_shape_fn((3, trail_len + 1), |(_, t)| 0.2 * 0.9f64.powi(t as i32)),
        cprof: Array2::from_shape_fn((3, trail_len + 1), |(_, t)| 0.1 * 0.9f64.powi(t as i32)),
    }
}

fn cte_inverse_model(c: &mut Criterion) {
    let nrows = 2048;
    let ncols = 256;
    let raz = Array2::from_shape_fn((nrows, ncols), |(r, _)| 100.0 + (r % 50) as f64);
    let rsz = smooth_read_noise(&raz, 2.5, &CteOptions::default());
    let col_scales = uniform_scales(ncols);
    let fff = build_scale_map(&col_scales, nrows);
    let traps = sample_traps();
    let profiles = sample_profiles();
    let params = sample_params();

    let mut group = c.benchmark_group("cte inverse forward model");
    group.sample_size(10);
    group.bench_function("parallel", |b| {
        b.iter(|| {
            inverse_forward_model(
                black_box(&rsz),
                black_box(&fff),
                black_box(&traps),
                black_box(&profiles),
                black_box(&params),
                &CteOptions {
                    single_threaded: false,
                },
            )
        })
    });
    group.bench_function("single-threaded", |b| {
        b.iter(|| {
            inverse_forward_model(
                black_box(&rsz),
                black_box(&fff),
                black_box(&traps),
                black_box(&profiles),
                black_box(&params),
                &CteOptions {
                    single_threaded: true,
                },
            )
        })
    });
    group.finish();
}

criterion_group!(benches, cte_inverse_model);
criterion_main!(benches);
