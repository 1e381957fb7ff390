use proptest::prelude::*;
use tps_core::{Snapshot, Trajectory};

fn trajectory_strategy() -> impl Strategy<Value = Trajectory> {
    prop::collection::vec(
        (-10.0f64..10.0, -3.0f64..3.0, any::<bool>()),
        1..40,
    )
    .prop_map(|frames| {
        frames
            .into_iter()
            .map(|(x, v, flipped)| {
                let snapshot = Snapshot::new(vec![x], vec![v]);
                if flipped {
                    snapshot.reversed_copy()
                } else {
                    snapshot
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn double_reversal_restores_frames(traj in trajectory_strategy()) {
        let twice = traj.reversed().reversed();
        prop_assert_eq!(&twice, &traj);
        prop_assert_eq!(twice.canonical_hash(), traj.canonical_hash());
    }

    #[test]
    fn single_reversal_toggles_every_flag(traj in trajectory_strategy()) {
        let rev = traj.reversed();
        let n = traj.len();
        for (i, frame) in rev.iter().enumerate() {
            let source = &traj[n - 1 - i];
            prop_assert_eq!(&frame.coordinates, &source.coordinates);
            prop_assert_eq!(&frame.velocities, &source.velocities);
            prop_assert_eq!(frame.momentum_reversed, !source.momentum_reversed);
        }
    }

    #[test]
    fn slicing_and_concat_rebuild_the_path(traj in trajectory_strategy(), cut in 0usize..40) {
        let cut = cut.min(traj.len());
        let rebuilt = traj.slice(..cut).concat(&traj.slice(cut..));
        prop_assert_eq!(rebuilt, traj);
    }
}
