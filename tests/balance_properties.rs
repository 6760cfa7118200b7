//! Property tests for least-loaded selection

mod fixtures;

use fixtures::{create_test_system, pool};
use game_coordinator::balancer::{select_least_loaded, ServerLoad};
use game_coordinator::store::AssignmentStore;
use proptest::prelude::*;

fn server_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("10.0.0.{}:7878", i + 1)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Sequential fresh lobbies keep every server within one assignment
    #[test]
    fn prop_sequential_assignments_stay_balanced(servers in 1usize..6, lobbies in 0usize..40) {
        let names = server_names(servers);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let system = create_test_system(pool(&refs));

        let loads = tokio_test::block_on(async {
            for i in 0..lobbies {
                system.coordinator.assign_server(&format!("lobby-{}", i)).await.unwrap();
            }
            system.coordinator.server_loads().await.unwrap()
        });

        let max = loads.iter().map(|l| l.assignments).max().unwrap();
        let min = loads.iter().map(|l| l.assignments).min().unwrap();
        prop_assert!(max - min <= 1);
        prop_assert_eq!(loads.iter().map(|l| l.assignments).sum::<u64>(), lobbies as u64);

        // Pool order breaks ties, so the surplus sits on the leading servers
        let surplus = lobbies % servers;
        for (idx, load) in loads.iter().enumerate() {
            let expected = (lobbies / servers + usize::from(idx < surplus)) as u64;
            prop_assert_eq!(load.assignments, expected);
        }
    }

    /// The pick is a minimum, and the first one in pool order
    #[test]
    fn prop_selection_is_first_minimum(counts in prop::collection::vec(0u64..10, 1..8)) {
        let loads: Vec<ServerLoad> = counts
            .iter()
            .enumerate()
            .map(|(i, &assignments)| ServerLoad {
                server_address: format!("s{}", i),
                assignments,
            })
            .collect();

        let chosen = select_least_loaded(&loads).unwrap();
        let min = *counts.iter().min().unwrap();
        let first_min = counts.iter().position(|&c| c == min).unwrap();

        prop_assert_eq!(chosen.assignments, min);
        prop_assert_eq!(&chosen.server_address, &format!("s{}", first_min));
    }

    /// Pre-existing load is honoured: the next pick is the least-loaded server
    #[test]
    fn prop_prefilled_store_picks_least_loaded(prefill in prop::collection::vec(0usize..4, 0..20)) {
        let names = server_names(4);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let system = create_test_system(pool(&refs));

        let mut counts = [0u64; 4];
        let chosen = tokio_test::block_on(async {
            for (i, &server) in prefill.iter().enumerate() {
                system.store.set(&format!("existing-{}", i), &names[server]).await.unwrap();
                counts[server] += 1;
            }
            system.coordinator.assign_server("next").await.unwrap()
        });

        let min = *counts.iter().min().unwrap();
        let expected = counts.iter().position(|&c| c == min).unwrap();
        prop_assert_eq!(chosen, names[expected].clone());
    }
}
