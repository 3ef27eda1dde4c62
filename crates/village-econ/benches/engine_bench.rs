use criterion::{black_box, criterion_group, criterion_main, Criterion};
use village_core::{BalanceConfig, BuildingInstance, Catalogs, GameState};
use village_econ::{ProductionEngine, StateModifiers};

fn build_village(copies: u64) -> (Catalogs, GameState) {
    let catalogs = Catalogs::village_default();
    let mut state = GameState::new(&catalogs.resources);
    let kinds: Vec<String> = catalogs.buildings.iter().map(|d| d.kind.0.clone()).collect();
    let mut id = 1;
    for _ in 0..copies {
        for kind in &kinds {
            state.buildings.push(BuildingInstance::new(id, kind).with_workers(2));
            id += 1;
        }
    }
    for def in catalogs.resources.iter() {
        state.resources.add(def.id.as_str(), 1_000_000.0);
    }
    state.population = 200;
    (catalogs, state)
}

fn bench_engine(c: &mut Criterion) {
    let (catalogs, state) = build_village(20);
    let config = BalanceConfig::default();
    let engine = ProductionEngine::new(&catalogs, &config);
    let providers = StateModifiers::new(&config);
    c.bench_function("tick 240 buildings", |b| {
        let mut s = state.clone();
        b.iter(|| black_box(engine.tick(&mut s, &providers, 1.0)))
    });
    c.bench_function("total_rates 240 buildings", |b| {
        b.iter(|| black_box(engine.total_rates(&state, &providers)))
    });
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
