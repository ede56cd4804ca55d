use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ddh_ipfe::{utils, Ddh, SchemeConfig};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_encrypt(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let mut group = c.benchmark_group("encrypt");

    for vec_len in [1usize, 3, 5, 10, 15] {
        for (modulus_bits, bound_bits) in [(64u64, 16u32), (256, 16), (256, 32)] {
            let bound = BigUint::from(1u64 << bound_bits);
            let config = SchemeConfig::new(vec_len)
                .with_modulus_bits(modulus_bits)
                .with_bound(bound.clone());
            let ddh = Ddh::new(&config, &mut rng).unwrap();
            let (_, mpk) = ddh.generate_master_keys(&mut rng);
            let x: Vec<BigUint> = (0..vec_len)
                .map(|_| utils::random_below(&mut rng, &bound))
                .collect();

            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}_{}_{}", vec_len, modulus_bits, bound)),
                &(ddh, mpk, x),
                |b, inp| {
                    b.iter(|| inp.0.encrypt(&inp.2, &inp.1, &mut rng).unwrap());
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_encrypt);
criterion_main!(benches);
