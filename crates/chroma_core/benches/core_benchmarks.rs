//! Criterion benchmarks for chroma_core registry lookups and exporter access.
//!
//! Measures parameter lookup and sensitivity toggling in the registry, and
//! indexed versus bulk access through the solution exporter for growing
//! axial discretisations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chroma_core::registry::ParameterRegistry;
use chroma_core::solution::{BlockLayout, SolutionExporter, StateLayout, StateOrdering};
use chroma_core::types::{AdConfig, ParameterId, ParameterName};

/// Registry with per-component film diffusion and binding constants.
fn populated_registry(ncomp: u32) -> ParameterRegistry {
    let mut registry = ParameterRegistry::new(0, AdConfig::new(8));
    for comp in 0..ncomp {
        for name in [ParameterName::FilmDiffusion, ParameterName::LinKa, ParameterName::LinKd] {
            let id = ParameterId::new(name).unit(0).component(comp);
            registry.register(id, 1.0 + comp as f64).unwrap();
        }
    }
    registry
}

/// Column layout with interleaved particle shells.
fn column_layout(ncomp: usize, ncol: usize, npar: usize) -> StateLayout {
    use StateOrdering::*;
    let shell = 2 * ncomp;
    let par_off = ncomp + ncomp * ncol;
    StateLayout::builder(ncomp)
        .axial_cells(ncol)
        .radial_cells(npar)
        .bound_states(vec![1; ncomp])
        .inlet(0, 1)
        .outlet(ncomp + (ncol - 1) * ncomp, 1)
        .bulk(BlockLayout::dense(ncomp, &[AxialCell, Component], &[ncol, ncomp]))
        .particle_mobile_phase(BlockLayout::new(
            par_off,
            &[(AxialCell, npar * shell), (RadialCell, shell), (Component, 1)],
        ))
        .solid_phase(BlockLayout::new(
            par_off + ncomp,
            &[(AxialCell, npar * shell), (RadialCell, shell), (BoundState, 1)],
        ))
        .build()
        .unwrap()
}

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    for ncomp in [2u32, 10, 50] {
        let registry = populated_registry(ncomp);
        let id = ParameterId::new(ParameterName::LinKd).unit(0).component(ncomp - 1);

        group.bench_with_input(BenchmarkId::new("parameter_double", ncomp), &registry, |b, r| {
            b.iter(|| r.parameter_double(black_box(&id)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("toggle_sensitive", ncomp), &ncomp, |b, _| {
            let mut registry = populated_registry(ncomp);
            b.iter(|| {
                registry.set_sensitive_parameter(black_box(&id), 3, 1.0).unwrap();
                registry.clear_sens_params();
            });
        });
    }

    group.finish();
}

fn bench_exporter(c: &mut Criterion) {
    let mut group = c.benchmark_group("exporter");

    for ncol in [16, 128, 1024] {
        let layout = column_layout(4, ncol, 8);
        let state: Vec<f64> = (0..layout.num_dofs()).map(|i| i as f64).collect();
        let exporter = SolutionExporter::new(&layout, &state).unwrap();

        group.bench_with_input(BenchmarkId::new("indexed_bulk", ncol), &exporter, |b, ex| {
            b.iter(|| {
                let mut sum = 0.0;
                for cell in 0..ex.num_axial_cells() {
                    for comp in 0..ex.num_components() {
                        sum += ex.concentration_at(comp, cell);
                    }
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("slice_bulk", ncol), &exporter, |b, ex| {
            b.iter(|| black_box(ex.concentration().iter().sum::<f64>()));
        });

        group.bench_with_input(BenchmarkId::new("indexed_solid", ncol), &exporter, |b, ex| {
            b.iter(|| {
                let mut sum = 0.0;
                for cell in 0..ex.num_axial_cells() {
                    for shell in 0..ex.num_radial_cells() {
                        sum += ex.solid_phase_at(0, cell, shell, 0);
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registry, bench_exporter);
criterion_main!(benches);
