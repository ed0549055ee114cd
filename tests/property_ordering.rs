use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use jobdag::{Job, Priority, Scheduler};
use jobdag_test_utils::{init_tracing, test_config};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Random DAG as dependency lists. Acyclic by construction: job `i` only
/// depends on jobs `0..i`.
fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_jobs).prop_flat_map(|num_jobs| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), num_jobs)
            .prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, candidates)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            candidates.into_iter().map(|c| c % i).collect()
                        }
                    })
                    .collect()
            })
    })
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: Instant,
    end: Instant,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn dependencies_finish_before_dependants_start(
        deps in dag_strategy(24),
        priorities in proptest::collection::vec(any::<bool>(), 24),
    ) {
        init_tracing();
        let scheduler = Scheduler::initialize(test_config())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let spans: Arc<Mutex<HashMap<usize, Span>>> = Arc::new(Mutex::new(HashMap::new()));

        let jobs: Vec<Job> = (0..deps.len())
            .map(|i| {
                let spans = Arc::clone(&spans);
                scheduler.job(format!("job_{i}"), move |_| {
                    let start = Instant::now();
                    std::thread::yield_now();
                    spans.lock().insert(i, Span { start, end: Instant::now() });
                    Ok(())
                })
            })
            .collect();

        for (i, job_deps) in deps.iter().enumerate() {
            let dep_jobs: Vec<&Job> = job_deps.iter().map(|&d| &jobs[d]).collect();
            let priority = Priority::from(priorities.get(i).copied().unwrap_or(false));
            jobs[i]
                .submit(priority, &dep_jobs)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        for job in &jobs {
            prop_assert!(job.wait_for_completion(None), "{} did not finish", job.label());
            prop_assert!(job.ran_to_completion());
        }

        let spans = spans.lock().clone();
        prop_assert_eq!(spans.len(), jobs.len());
        for (i, job_deps) in deps.iter().enumerate() {
            for &d in job_deps {
                prop_assert!(
                    spans[&d].end <= spans[&i].start,
                    "job_{} started before its dependency job_{} finished",
                    i,
                    d
                );
            }
        }

        scheduler.shutdown();
    }
}
