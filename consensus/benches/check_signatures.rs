use criterion::{Criterion, criterion_group, criterion_main};
use galaxy_consensus::{
    processes::eventcheck::heavy::{HeavyCheck, HeavyCheckContext, HeavyChecker},
    test_helpers::TestDag,
};
use galaxy_consensus_core::{ValidatorId, event::Event};
use std::{hint::black_box, sync::Arc};

const VALIDATORS: ValidatorId = 10;

fn mock_events(count: usize) -> (TestDag, Vec<Arc<Event>>) {
    let mut dag = TestDag::new(1);
    let mut events = Vec::with_capacity(count);
    let mut heads: Vec<Option<Arc<Event>>> = vec![None; VALIDATORS as usize];
    for i in 0..count {
        let creator = (i as ValidatorId % VALIDATORS) + 1;
        let mut parents: Vec<_> = heads[(creator - 1) as usize].iter().map(|e| e.id()).collect();
        parents.extend(heads.iter().flatten().filter(|e| e.creator != creator).take(2).map(|e| e.id()));
        let event = dag.add(creator, &parents);
        heads[(creator - 1) as usize] = Some(event.clone());
        events.push(event);
    }
    (dag, events)
}

fn benchmark_check_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("check signatures");
    for count in [1, 8, 64, 256] {
        let (mut dag, events) = mock_events(count);
        let weights: Vec<_> = (1..=VALIDATORS).map(|id| (id, 1)).collect();
        let es = dag.epoch_state(&weights);

        for threads in [1, 4] {
            let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap());
            let checker = HeavyChecker::new(HeavyCheckContext::from(&es), pool, 8);
            group.bench_function(format!("batch of {count}, {threads} threads"), |b| {
                b.iter(|| {
                    let results = checker.validate_batch(black_box(&events));
                    assert!(results.iter().all(|r| r.is_ok()));
                })
            });
        }

        let checker = HeavyChecker::new(HeavyCheckContext::from(&es), Arc::new(rayon::ThreadPoolBuilder::new().build().unwrap()), 8);
        group.bench_function(format!("one by one, {count}"), |b| {
            b.iter(|| {
                for event in events.iter() {
                    checker.validate(black_box(event)).unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchmark_check_signatures
}

criterion_main!(benches);
