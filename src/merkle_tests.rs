#[cfg(test)]
mod tests {
    use crate::error::{Error, ErrorKind};
    use crate::merkle::{GroupTree, SharedGroup, MAX_DEPTH};
    use crate::utils::poseidon_hash;
    use pasta_curves::pallas;
    use std::thread;

    fn leaves(count: u64) -> Vec<pallas::Base> {
        (1..=count).map(pallas::Base::from).collect()
    }

    #[test]
    fn test_group_tree_creation() {
        let tree = GroupTree::with_members(2, leaves(4)).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.capacity(), 4);
        assert_eq!(tree.members(), leaves(4).as_slice());
    }

    #[test]
    fn test_root_matches_full_recomputation() {
        let l = leaves(4);
        let tree = GroupTree::with_members(2, l.clone()).unwrap();
        let expected = poseidon_hash(poseidon_hash(l[0], l[1]), poseidon_hash(l[2], l[3]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_partial_tree_uses_zero_leaves() {
        let l = leaves(3);
        let tree = GroupTree::with_members(2, l.clone()).unwrap();
        let zero = pallas::Base::from(0);
        let expected = poseidon_hash(poseidon_hash(l[0], l[1]), poseidon_hash(l[2], zero));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_bulk_build_matches_incremental_inserts() {
        for (depth, count) in [(3, 5), (4, 7), (5, 1), (6, 33)] {
            let bulk = GroupTree::with_members(depth, leaves(count)).unwrap();
            let mut incremental = GroupTree::new(depth).unwrap();
            for leaf in leaves(count) {
                incremental.add_member(leaf).unwrap();
            }

            assert_eq!(bulk.root(), incremental.root(), "depth {depth}, {count} members");
            for index in 0..count as usize {
                assert_eq!(bulk.merkle_path(index), incremental.merkle_path(index));
                assert_eq!(bulk.index_of(&leaves(count)[index]), Some(index));
            }
        }
    }

    #[test]
    fn test_bulk_build_keeps_accepting_inserts() {
        let mut bulk = GroupTree::with_members(3, leaves(5)).unwrap();
        let mut incremental = GroupTree::new(3).unwrap();
        for leaf in leaves(6) {
            incremental.add_member(leaf).unwrap();
        }

        assert_eq!(bulk.add_member(pallas::Base::from(6)).unwrap(), 5);
        assert_eq!(bulk.root(), incremental.root());
    }

    #[test]
    fn test_bulk_build_rejects_bad_members() {
        let mut with_duplicate = leaves(4);
        with_duplicate.push(pallas::Base::from(2));
        let err = GroupTree::with_members(3, with_duplicate).unwrap_err();
        assert!(matches!(err, Error::DuplicateMember(_)));

        let err = GroupTree::with_members(2, leaves(5)).unwrap_err();
        assert!(matches!(err, Error::GroupFull { depth: 2, capacity: 4 }));

        let err = GroupTree::with_members(2, [pallas::Base::from(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_add_member_changes_root() {
        let mut tree = GroupTree::new(3).unwrap();
        let empty_root = tree.root();

        let index = tree.add_member(pallas::Base::from(42)).unwrap();
        assert_eq!(index, 0);
        assert_ne!(tree.root(), empty_root);
        assert!(tree.contains(&pallas::Base::from(42)));

        let before = tree.root();
        assert_eq!(tree.add_member(pallas::Base::from(43)).unwrap(), 1);
        assert_ne!(tree.root(), before);
    }

    #[test]
    fn test_duplicate_member_rejected_and_root_unchanged() {
        let mut tree = GroupTree::with_members(3, leaves(2)).unwrap();
        let root = tree.root();

        let err = tree.add_member(pallas::Base::from(1)).unwrap_err();
        assert!(matches!(err, Error::DuplicateMember(_)));
        assert_eq!(err.kind(), ErrorKind::Tree);
        assert_eq!(tree.root(), root);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_group_full() {
        let mut tree = GroupTree::with_members(1, leaves(2)).unwrap();
        let root = tree.root();

        let err = tree.add_member(pallas::Base::from(99)).unwrap_err();
        assert!(matches!(
            err,
            Error::GroupFull {
                depth: 1,
                capacity: 2
            }
        ));
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_zero_commitment_rejected() {
        let mut tree = GroupTree::new(2).unwrap();
        assert!(matches!(
            tree.add_member(pallas::Base::from(0)),
            Err(Error::InvalidInput(_))
        ));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_invalid_depth() {
        assert!(GroupTree::new(0).is_err());
        assert!(GroupTree::new(MAX_DEPTH + 1).is_err());
        assert!(GroupTree::new(MAX_DEPTH).is_ok());
    }

    #[test]
    fn test_merkle_path_reaches_root() {
        let l = leaves(5);
        let tree = GroupTree::with_members(4, l.clone()).unwrap();
        for (i, leaf) in l.iter().enumerate() {
            let path = tree.merkle_path(i).unwrap();
            assert_eq!(path.siblings.len(), 4);
            assert_eq!(path.compute_root(*leaf), tree.root());
        }
    }

    #[test]
    fn test_merkle_path_with_invalid_index() {
        let tree = GroupTree::with_members(2, leaves(3)).unwrap();
        assert!(tree.merkle_path(3).is_none());
    }

    #[test]
    fn test_merkle_path_with_tampered_leaf() {
        let tree = GroupTree::with_members(2, leaves(4)).unwrap();
        let path = tree.merkle_path(0).unwrap();
        assert_ne!(path.compute_root(pallas::Base::from(0xFF)), tree.root());
    }

    #[test]
    fn test_merkle_path_with_tampered_siblings() {
        let tree = GroupTree::with_members(2, leaves(4)).unwrap();
        let mut path = tree.merkle_path(1).unwrap();
        path.siblings[0] = pallas::Base::from(0xFF);
        assert_ne!(path.compute_root(pallas::Base::from(2)), tree.root());
    }

    #[test]
    fn test_large_group_tree() {
        let l = leaves(1024);
        let tree = GroupTree::with_members(10, l.clone()).unwrap();
        let path = tree.merkle_path(512).unwrap();
        assert_eq!(path.compute_root(l[512]), tree.root());
        assert_eq!(tree.index_of(&l[512]), Some(512));
    }

    #[test]
    fn test_snapshot_membership_path() {
        let l = leaves(3);
        let snapshot = GroupTree::with_members(2, l.clone()).unwrap().snapshot();
        let path = snapshot.membership_path(&l[2]).unwrap();
        assert_eq!(path.leaf_index, 2);
        assert!(snapshot.contains(&l[2]));
        assert!(!snapshot.contains(&pallas::Base::from(77)));

        let err = snapshot
            .membership_path(&pallas::Base::from(77))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Membership);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_inserts() {
        let mut tree = GroupTree::with_members(2, leaves(1)).unwrap();
        let snapshot = tree.snapshot();
        tree.add_member(pallas::Base::from(5)).unwrap();

        assert_eq!(snapshot.members().len(), 1);
        assert_ne!(snapshot.root(), tree.root());
    }

    #[test]
    fn test_stale_snapshot_root_is_a_computation_error() {
        let tree = GroupTree::with_members(2, leaves(2)).unwrap();
        let mut json = serde_json::to_value(tree.snapshot()).unwrap();
        let other = GroupTree::with_members(2, leaves(3)).unwrap();
        json["root"] = serde_json::to_value(other.snapshot()).unwrap()["root"].clone();

        let stale: crate::merkle::GroupSnapshot = serde_json::from_value(json).unwrap();
        let err = stale.membership_path(&pallas::Base::from(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_shared_group_concurrent_inserts() {
        let group = SharedGroup::new(8).unwrap();
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let group = group.clone();
                thread::spawn(move || {
                    for i in 0..16u64 {
                        group.add_member(pallas::Base::from(1 + t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let members = group.members();
        assert_eq!(members.len(), 64);
        let rebuilt = GroupTree::with_members(8, members).unwrap();
        assert_eq!(rebuilt.root(), group.root());
    }
}
