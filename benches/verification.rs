//! Performance benchmarks for credential checks.
//!
//! Run with: `cargo bench --bench verification`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Cold token verification | <50µs p99 | Full HMAC computation |
//! | Cached token verification | <5µs p99 | LRU cache hit |
//! | Cache contention | Linear scaling | Multi-threaded access |
//! | Password verification | tunable | Dominated by Argon2 cost |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};
use std::sync::Arc;
use std::thread;

use authorship_kernel::config::PasswordParams;
use authorship_kernel::credentials::{Argon2Hasher, TokenClaims};
use authorship_kernel::{
    BearerToken, CacheConfig, Role, TokenVerifier, UserId, VerificationMode,
};
use uuid::Uuid;

const SECRET: &[u8] = b"benchmark_secret_32_bytes_min___";

/// Far enough in the future that no token expires mid-run.
const NOW: i64 = 1_700_000_000;

/// Create a signed token for the given subject.
fn make_token(id: u128) -> BearerToken {
    TokenClaims {
        subject: UserId::new(Uuid::from_u128(id)),
        role: Role::User,
        expires_at: NOW + 3600,
    }
    .sign(SECRET)
    .unwrap()
}

/// Benchmark cold verification (no cache).
fn bench_cold_verification(c: &mut Criterion) {
    let verifier = TokenVerifier::new(VerificationMode::local_secret(SECRET.to_vec()));
    let token = make_token(1);

    let mut group = c.benchmark_group("cold_verification");
    group.throughput(Throughput::Elements(1));
    group.bench_function("local_secret", |b| {
        b.iter(|| {
            let result = verifier.verify_at(black_box(&token), NOW);
            assert!(result.is_valid());
            result
        })
    });
    group.finish();
}

/// Benchmark cached verification (cache hit).
fn bench_cached_verification(c: &mut Criterion) {
    let verifier = TokenVerifier::new(VerificationMode::cached_with_config(
        SECRET.to_vec(),
        CacheConfig {
            max_entries: 10_000,
            enabled: true,
        },
    ));
    let token = make_token(1);

    // Warm the cache
    let warmup = verifier.verify_at(&token, NOW);
    assert!(warmup.is_valid());
    assert!(!warmup.cache_hit);

    let mut group = c.benchmark_group("cached_verification");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        b.iter(|| {
            let result = verifier.verify_at(black_box(&token), NOW);
            assert!(result.cache_hit);
            result
        })
    });
    group.finish();
}

/// Benchmark cache miss scenario (new entries).
fn bench_cache_miss(c: &mut Criterion) {
    let verifier = TokenVerifier::new(VerificationMode::cached_with_config(
        SECRET.to_vec(),
        CacheConfig {
            max_entries: 100_000,
            enabled: true,
        },
    ));

    let tokens: Vec<_> = (0..1000).map(|i| make_token(i + 1000)).collect();

    c.bench_function("cache_miss", |b| {
        let mut idx = 0;
        b.iter(|| {
            let token = &tokens[idx % tokens.len()];
            idx += 1;
            let result = verifier.verify_at(black_box(token), NOW);
            assert!(result.is_valid());
            result
        })
    });
}

/// Benchmark multi-threaded cache access.
fn bench_cache_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_contention");

    for num_threads in [1, 2, 4, 8] {
        let verifier = Arc::new(TokenVerifier::new(VerificationMode::cached_with_config(
            SECRET.to_vec(),
            CacheConfig::default(),
        )));

        let tokens: Vec<_> = (0..num_threads).map(|i| make_token(10 + i as u128)).collect();
        for token in &tokens {
            verifier.verify_at(token, NOW);
        }

        group.throughput(Throughput::Elements(num_threads as u64));
        group.bench_with_input(
            BenchmarkId::new("threads", num_threads),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let handles: Vec<_> = (0..n)
                        .map(|i| {
                            let v = Arc::clone(&verifier);
                            let t = tokens[i].clone();
                            thread::spawn(move || {
                                for _ in 0..100 {
                                    let result = v.verify_at(black_box(&t), NOW);
                                    assert!(result.is_valid());
                                }
                            })
                        })
                        .collect();

                    for h in handles {
                        h.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

/// Benchmark password verification at increasing Argon2 memory cost.
fn bench_password_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("password_verification");
    group.sample_size(10);

    for memory_kib in [8u32, 1024, 19_456] {
        let hasher = Argon2Hasher::new(PasswordParams {
            memory_kib,
            iterations: if memory_kib == 8 { 1 } else { 2 },
            parallelism: 1,
        })
        .unwrap();
        let hash = hasher.hash("benchmark-password").unwrap();

        group.bench_with_input(BenchmarkId::new("memory_kib", memory_kib), &hash, |b, hash| {
            b.iter(|| {
                let ok = hasher.verify(black_box("benchmark-password"), hash);
                assert!(ok);
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cold_verification,
    bench_cached_verification,
    bench_cache_miss,
    bench_cache_contention,
    bench_password_verification,
);
criterion_main!(benches);
