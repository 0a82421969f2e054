//! Criterion benchmarks for CLOAK key math: keygen, ECDH, view tag, derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use cloak_crypto::{
    compute_commitment, compute_shared_secret, compute_view_tag, derive_stealth_address,
    derive_stealth_secret_key, generate_keypair,
};

fn bench_keygen(c: &mut Criterion) {
    let mut g = c.benchmark_group("keygen");
    g.throughput(Throughput::Elements(1));
    g.bench_function("generate_keypair", |b| {
        b.iter(|| black_box(generate_keypair()));
    });
    g.finish();
}

fn bench_ecdh(c: &mut Criterion) {
    let ephemeral = generate_keypair();
    let viewing = generate_keypair();
    let mut g = c.benchmark_group("ecdh");
    g.throughput(Throughput::Elements(1));
    g.bench_function("compute_shared_secret", |b| {
        b.iter(|| black_box(compute_shared_secret(&ephemeral.secret, &viewing.public)).unwrap());
    });
    g.finish();
}

fn bench_view_tag(c: &mut Criterion) {
    let ephemeral = generate_keypair();
    let viewing = generate_keypair();
    let ss = compute_shared_secret(&ephemeral.secret, &viewing.public).unwrap();
    let mut g = c.benchmark_group("view_tag");
    g.throughput(Throughput::Elements(1));
    g.bench_function("compute_view_tag", |b| {
        b.iter(|| black_box(compute_view_tag(&ss)));
    });
    g.finish();
}

fn bench_stealth_derivation(c: &mut Criterion) {
    let spending = generate_keypair();
    let viewing = generate_keypair();
    let ephemeral = generate_keypair();
    let ss = compute_shared_secret(&ephemeral.secret, &viewing.public).unwrap();
    let address = derive_stealth_address(&spending.public, &ss).unwrap();

    let mut g = c.benchmark_group("stealth_derivation");
    g.throughput(Throughput::Elements(1));
    g.bench_function("derive_stealth_address", |b| {
        b.iter(|| black_box(derive_stealth_address(&spending.public, &ss)).unwrap());
    });
    g.bench_function("derive_stealth_secret_key", |b| {
        b.iter(|| black_box(derive_stealth_secret_key(&spending.secret, &ss)).unwrap());
    });
    g.bench_function("compute_commitment", |b| {
        b.iter(|| black_box(compute_commitment(&address, &ephemeral.public)));
    });
    g.finish();
}

criterion_group!(
    benches,
    bench_keygen,
    bench_ecdh,
    bench_view_tag,
    bench_stealth_derivation
);
criterion_main!(benches);
