//! Benchmarks for the lock / unlock / reactivate cycle

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flom_core::prelude::*;
use flom_resource::{RegistryConfig, ResourceRegistry};

struct Discard;

impl AnswerSink for Discard {
    fn deliver(&self, _connection: ConnectionId, _answer: LockAnswer) -> FlomResult<()> {
        Ok(())
    }
}

fn cycle(registry: &mut ResourceRegistry, name: &str) {
    let holder = ConnectionId(1);
    let waiter = ConnectionId(2);
    let lock: LockRequest = LockSpec::new(name).into();
    let unlock: LockRequest = UnlockSpec::new(name).into();

    let _ = registry.handle_message(&lock, holder, &Discard);
    let _ = registry.handle_message(&lock, waiter, &Discard);
    let _ = registry.handle_message(&unlock, holder, &Discard);
    let _ = registry.handle_message(&unlock, waiter, &Discard);
}

fn bench_lock_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_cycle");

    for name in ["printer", "pool[1]", "/dir/file", "_S_ids", "a.b"] {
        group.bench_function(name, |b| {
            let mut registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
            b.iter(|| cycle(&mut registry, black_box(name)));
        });
    }

    group.bench_function("deep_tree", |b| {
        let mut registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
        let sink = Discard;
        for conn in 0..64u64 {
            let path = format!("/root/n{}/leaf{}", conn % 8, conn);
            let _ = registry.handle_message(
                &LockSpec::new(path).mode(LockMode::ProtectedRead).into(),
                ConnectionId(1_000 + conn),
                &sink,
            );
        }
        b.iter(|| cycle(&mut registry, black_box("/root/n3")));
    });

    group.finish();
}

criterion_group!(benches, bench_lock_cycle);
criterion_main!(benches);
