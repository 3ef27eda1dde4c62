use criterion::{black_box, criterion_group, criterion_main, Criterion};
use persistence::SaveEnvelope;
use village_core::{BalanceConfig, BuildingInstance, Catalogs, GameState};
use village_econ::{ProductionEngine, StateModifiers};
use village_runtime::catchup;

const NOW: i64 = 1_700_000_000_000;

fn bench_catchup(c: &mut Criterion) {
    let catalogs = Catalogs::village_default();
    let config = BalanceConfig::default();
    let engine = ProductionEngine::new(&catalogs, &config);
    let providers = StateModifiers::new(&config);

    let mut state = GameState::fresh(&catalogs.resources, &config);
    let kinds: Vec<String> = catalogs.buildings.iter().map(|d| d.kind.0.clone()).collect();
    for (i, kind) in kinds.iter().cycle().take(120).enumerate() {
        state.buildings.push(BuildingInstance::new(i as u64 + 1, kind).with_workers(2));
    }
    state.population = 240;
    let envelope = SaveEnvelope::new(state, NOW - 8 * 3_600_000);

    c.bench_function("catch-up 8h 120 buildings", |b| {
        b.iter(|| {
            let mut env = envelope.clone();
            black_box(catchup::apply(&engine, &providers, &mut env, NOW))
        })
    });

    let raw = serde_json::to_value(&envelope).unwrap_or_default();
    c.bench_function("migrate current save", |b| {
        b.iter(|| black_box(persistence::migrate(&raw)))
    });
}

criterion_group!(benches, bench_catchup);
criterion_main!(benches);
