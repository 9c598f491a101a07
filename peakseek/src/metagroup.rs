//! Meta-grouping: nesting isotopologue and adduct groups under their
//! most likely parent groups.
//!
//! The pass runs in phases over the flat group container:
//!
//! 1. Bucket parent-form groups by compound and keep only the N best
//!    per compound by descending rank.
//! 2. Assign stable group ids to everything that survived.
//! 3. Bucket the remaining child groups (isotopologues, adducts) by
//!    compound.
//! 4. Per compound and per sub-type name, match children to parents by
//!    minimizing RT distance under an exclusivity constraint; a losing
//!    competitor re-selects recursively.
//! 5. Children left without a parent are attached to a synthetic ghost.
//! 6. Matched children move into their parent and are swap-removed from
//!    the container.
//!
//! Compound and sub-type buckets are `BTreeMap`s and every tie breaks
//! on index order, so the output is deterministic for a deterministic
//! input ordering.

use std::collections::BTreeMap;
use std::sync::Arc;

use eicquery::Compound;

use crate::models::PeakGroup;
use crate::params::EngineParams;
use crate::progress::ProgressSink;

pub fn perform_meta_grouping(
    groups: &mut Vec<PeakGroup>,
    params: &EngineParams,
    progress: &dyn ProgressSink,
) {
    progress.progress("Performing meta-grouping…", 0, 0);

    let parent_buckets = bucket_parents(groups);
    keep_n_best_ranked(&parent_buckets, groups, params.eic_max_groups);
    // Pruning shifts container indices; rebucket before matching.
    let parent_buckets = bucket_parents(groups);

    for (i, group) in groups.iter_mut().enumerate() {
        group.group_id = i + 1;
    }

    let mut isotope_buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut adduct_buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut compounds_by_id: BTreeMap<String, Arc<Compound>> = BTreeMap::new();
    for (i, group) in groups.iter().enumerate() {
        let Some(compound) = &group.compound else {
            continue;
        };
        if group.is_isotope() {
            isotope_buckets.entry(compound.id.clone()).or_default().push(i);
        } else if group.is_adduct() {
            adduct_buckets.entry(compound.id.clone()).or_default().push(i);
        } else {
            continue;
        }
        compounds_by_id
            .entry(compound.id.clone())
            .or_insert_with(|| compound.clone());
    }

    if isotope_buckets.is_empty() && adduct_buckets.is_empty() {
        return;
    }

    // parent index -> child indices, merged across both passes.
    let mut meta: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (compound_id, child_idxs) in &isotope_buckets {
        make_meta(
            groups,
            params,
            &parent_buckets,
            &compounds_by_id[compound_id],
            child_idxs,
            &|group: &PeakGroup| group.isotope.name.clone(),
            &mut meta,
        );
    }
    for (compound_id, child_idxs) in &adduct_buckets {
        make_meta(
            groups,
            params,
            &parent_buckets,
            &compounds_by_id[compound_id],
            child_idxs,
            &|group: &PeakGroup| {
                group
                    .adduct
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or_default()
            },
            &mut meta,
        );
    }

    // Nest children under their parents, then compact the container.
    let mut indexes_to_erase: Vec<usize> = Vec::new();
    for (&parent_idx, child_idxs) in &meta {
        for &child_idx in child_idxs {
            let child = groups[child_idx].clone();
            if child.is_isotope() {
                groups[parent_idx].add_isotope_child(child);
            } else if child.is_adduct() {
                groups[parent_idx].add_adduct_child(child);
            }
            indexes_to_erase.push(child_idx);
        }
    }

    // Swap-with-last removal does not preserve order; descending index
    // order keeps the pending indices valid.
    indexes_to_erase.sort_unstable_by(|a, b| b.cmp(a));
    indexes_to_erase.dedup();
    for index in indexes_to_erase {
        groups.swap_remove(index);
    }
}

/// Parent-form groups bucketed by compound id, skipping ghosts and
/// unannotated groups.
fn bucket_parents(groups: &[PeakGroup]) -> BTreeMap<String, Vec<usize>> {
    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, group) in groups.iter().enumerate() {
        let Some(compound) = &group.compound else {
            continue;
        };
        if group.is_ghost() {
            continue;
        }
        if group.is_parent_form() {
            buckets.entry(compound.id.clone()).or_default().push(i);
        }
    }
    buckets
}

/// Keeps the top `n_best` parents per compound by descending rank and
/// erases the rest from the container, preserving relative order of
/// the survivors.
fn keep_n_best_ranked(
    buckets: &BTreeMap<String, Vec<usize>>,
    groups: &mut Vec<PeakGroup>,
    n_best: usize,
) {
    let mut to_erase: Vec<usize> = Vec::new();
    for indexes in buckets.values() {
        if indexes.len() <= n_best {
            continue;
        }
        let mut sorted = indexes.clone();
        sorted.sort_by(|&a, &b| {
            groups[b]
                .group_rank
                .partial_cmp(&groups[a].group_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        to_erase.extend_from_slice(&sorted[n_best..]);
    }
    to_erase.sort_unstable_by(|a, b| b.cmp(a));
    for index in to_erase {
        groups.remove(index);
    }
}

/// Matches one compound's children (of one kind) to its parents, then
/// records the assignments into `meta`. Orphans get a fresh ghost
/// parent appended to the container.
fn make_meta(
    groups: &mut Vec<PeakGroup>,
    params: &EngineParams,
    parent_buckets: &BTreeMap<String, Vec<usize>>,
    compound: &Arc<Compound>,
    child_idxs: &[usize],
    name_fn: &dyn Fn(&PeakGroup) -> String,
    meta: &mut BTreeMap<usize, Vec<usize>>,
) {
    let (non_orphans, orphans) = match parent_buckets.get(&compound.id) {
        Some(parent_idxs) => match_parents_to_children(parent_idxs, child_idxs, groups, name_fn),
        None => (BTreeMap::new(), child_idxs.to_vec()),
    };

    for (child_idx, parent_idx) in non_orphans {
        meta.entry(parent_idx).or_default().push(child_idx);
    }

    if !orphans.is_empty() {
        let ghost = PeakGroup::ghost(compound.clone(), params.compound_mass_cutoff_window);
        groups.push(ghost);
        let ghost_idx = groups.len() - 1;
        groups[ghost_idx].group_id = groups.len();
        meta.entry(ghost_idx).or_default().extend(orphans);
    }
}

fn rt_dist(container: &[PeakGroup], a: usize, b: usize) -> f32 {
    (container[a].mean_rt - container[b].mean_rt).abs()
}

/// Stable matching between parents and children of one sub-type.
///
/// The smaller side acts as the subjects so each is guaranteed a
/// distinct object. Each subject walks its RT-sorted priority list;
/// a closer latecomer displaces the current holder, which then
/// re-selects recursively. Ties keep the earlier assignment.
///
/// Returns (child index -> parent index, orphaned child indices).
fn match_parents_to_children(
    parent_idxs: &[usize],
    child_idxs: &[usize],
    container: &[PeakGroup],
    name_fn: &dyn Fn(&PeakGroup) -> String,
) -> (BTreeMap<usize, usize>, Vec<usize>) {
    let mut name_grouped: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &child_idx in child_idxs {
        name_grouped
            .entry(name_fn(&container[child_idx]))
            .or_default()
            .push(child_idx);
    }

    let mut orphans: Vec<usize> = Vec::new();
    let mut non_orphans: BTreeMap<usize, usize> = BTreeMap::new();
    for kids in name_grouped.values() {
        let children_are_subjects = kids.len() <= parent_idxs.len();
        let (subjects, objects): (&[usize], &[usize]) = if children_are_subjects {
            (kids, parent_idxs)
        } else {
            (parent_idxs, kids)
        };

        let mut priority_lists: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &subject in subjects {
            let mut sorted_objects = objects.to_vec();
            sorted_objects.sort_by(|&o1, &o2| {
                rt_dist(container, o1, subject)
                    .partial_cmp(&rt_dist(container, o2, subject))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(o1.cmp(&o2))
            });
            priority_lists.insert(subject, sorted_objects);
        }

        let mut subjects_with_objects: BTreeMap<usize, usize> = BTreeMap::new();
        let mut objects_with_subjects: BTreeMap<usize, usize> = BTreeMap::new();
        for &subject in subjects {
            find_preferred_match(
                subject,
                &mut subjects_with_objects,
                &mut objects_with_subjects,
                &priority_lists,
                container,
            );
        }

        if children_are_subjects {
            non_orphans.extend(subjects_with_objects);
        } else {
            // Parents were the subjects; the objects map already reads
            // child -> parent.
            for (&child, &parent) in &objects_with_subjects {
                non_orphans.insert(child, parent);
            }
            for &child in kids {
                if !objects_with_subjects.contains_key(&child) {
                    orphans.push(child);
                }
            }
        }
    }
    (non_orphans, orphans)
}

/// Walks the subject's priority list until it claims an unassigned
/// object or displaces a competitor it beats on RT distance. Recursion
/// depth is bounded by the number of subjects.
fn find_preferred_match(
    subject: usize,
    subjects_with_objects: &mut BTreeMap<usize, usize>,
    objects_with_subjects: &mut BTreeMap<usize, usize>,
    priority_lists: &BTreeMap<usize, Vec<usize>>,
    container: &[PeakGroup],
) {
    let Some(priority_list) = priority_lists.get(&subject) else {
        return;
    };
    for &object in priority_list {
        match objects_with_subjects.get(&object).copied() {
            Some(competing_subject) => {
                if rt_dist(container, subject, object)
                    < rt_dist(container, competing_subject, object)
                {
                    subjects_with_objects.insert(subject, object);
                    objects_with_subjects.insert(object, subject);
                    subjects_with_objects.remove(&competing_subject);
                    find_preferred_match(
                        competing_subject,
                        subjects_with_objects,
                        objects_with_subjects,
                        priority_lists,
                        container,
                    );
                    break;
                }
            }
            None => {
                subjects_with_objects.insert(subject, object);
                objects_with_subjects.insert(object, subject);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntegrationType;
    use crate::progress::SilentProgress;
    use eicquery::{
        Isotope,
        Peak,
        QuantType,
        Slice,
    };

    fn compound(id: &str) -> Arc<Compound> {
        Arc::new(Compound {
            id: id.to_string(),
            name: id.to_string(),
            mz: 300.0,
            expected_rt: 5.0,
            charge: 1,
            precursor_mz: 0.0,
            product_mz: 0.0,
            collision_energy: 0.0,
            srm_id: String::new(),
            fragment_mzs: vec![],
            fragment_intensities: vec![],
        })
    }

    fn group_at(compound_ref: &Arc<Compound>, rt: f32, rank: f32) -> PeakGroup {
        let peak = Peak {
            rt,
            rt_min: rt - 0.1,
            rt_max: rt + 0.1,
            mz: 300.0,
            height: 100.0,
            quality: 0.5,
            sample_name: "a".to_string(),
            ..Peak::default()
        };
        let slice = Slice::from_mz_range(299.99, 300.01, 0.0, 10.0);
        let mut group = PeakGroup::from_peaks(vec![peak], &slice, QuantType::Height);
        group.compound = Some(compound_ref.clone());
        group.isotope = Isotope::parent();
        group.group_rank = rank;
        group
    }

    fn child_at(compound_ref: &Arc<Compound>, rt: f32, isotope: Isotope) -> PeakGroup {
        let mut group = group_at(compound_ref, rt, 0.1);
        group.isotope = isotope;
        group
    }

    fn run(groups: &mut Vec<PeakGroup>) {
        perform_meta_grouping(groups, &EngineParams::default(), &SilentProgress);
    }

    #[test]
    fn test_child_goes_to_nearest_parent() {
        let c = compound("c1");
        let mut groups = vec![
            group_at(&c, 5.0, 0.9),
            group_at(&c, 6.0, 0.7),
            child_at(&c, 5.05, Isotope::c13(1)),
        ];
        run(&mut groups);

        assert_eq!(groups.len(), 2);
        let near = groups
            .iter()
            .find(|g| (g.mean_rt - 5.0).abs() < 0.01)
            .unwrap();
        let far = groups
            .iter()
            .find(|g| (g.mean_rt - 6.0).abs() < 0.01)
            .unwrap();
        assert_eq!(near.isotope_children.len(), 1);
        assert!(far.isotope_children.is_empty());
    }

    #[test]
    fn test_conflict_resolution_displaces_loser() {
        let c = compound("c1");
        let mut groups = vec![
            group_at(&c, 5.0, 0.9),
            group_at(&c, 6.0, 0.8),
            // Both children prefer the parent at 5.0; the closer one
            // wins and the other falls back to 6.0.
            child_at(&c, 5.2, Isotope::c13(1)),
            child_at(&c, 5.1, Isotope::c13(1)),
        ];
        run(&mut groups);

        assert_eq!(groups.len(), 2);
        let p1 = groups
            .iter()
            .find(|g| (g.mean_rt - 5.0).abs() < 0.01)
            .unwrap();
        let p2 = groups
            .iter()
            .find(|g| (g.mean_rt - 6.0).abs() < 0.01)
            .unwrap();
        assert_eq!(p1.isotope_children.len(), 1);
        assert!((p1.isotope_children[0].mean_rt - 5.1).abs() < 0.01);
        assert_eq!(p2.isotope_children.len(), 1);
        assert!((p2.isotope_children[0].mean_rt - 5.2).abs() < 0.01);
    }

    #[test]
    fn test_orphans_get_ghost_parent() {
        let c = compound("c1");
        let mut groups = vec![
            child_at(&c, 4.0, Isotope::c13(1)),
            child_at(&c, 4.5, Isotope::c13(2)),
        ];
        run(&mut groups);

        assert_eq!(groups.len(), 1);
        let ghost = &groups[0];
        assert_eq!(ghost.integration_type, IntegrationType::Ghost);
        assert_eq!(ghost.isotope_children.len(), 2);
        assert_eq!(ghost.slice.rt_min, 0.0);
        assert_eq!(ghost.slice.rt_max, 0.0);
    }

    #[test]
    fn test_n_best_pruning() {
        let c = compound("c1");
        let mut groups: Vec<PeakGroup> = [10.0, 9.0, 8.0, 7.0, 6.0]
            .iter()
            .map(|&rank| group_at(&c, 5.0, rank))
            .collect();
        let mut params = EngineParams::default();
        params.eic_max_groups = 3;
        perform_meta_grouping(&mut groups, &params, &SilentProgress);

        assert_eq!(groups.len(), 3);
        let mut ranks: Vec<f32> = groups.iter().map(|g| g.group_rank).collect();
        ranks.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(ranks, vec![10.0, 9.0, 8.0]);
    }

    #[test]
    fn test_group_ids_are_sequential() {
        let c = compound("c1");
        let mut groups = vec![
            group_at(&c, 5.0, 0.9),
            group_at(&c, 6.0, 0.7),
        ];
        run(&mut groups);
        let mut ids: Vec<usize> = groups.iter().map(|g| g.group_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_same_subtype_is_exclusive_per_parent() {
        // More children than parents of one sub-type: the extra child
        // must orphan rather than doubling up on a parent.
        let c = compound("c1");
        let mut groups = vec![
            group_at(&c, 5.0, 0.9),
            child_at(&c, 5.1, Isotope::c13(1)),
            child_at(&c, 5.3, Isotope::c13(1)),
        ];
        run(&mut groups);

        let parents: Vec<&PeakGroup> = groups.iter().filter(|g| !g.is_ghost()).collect();
        let ghosts: Vec<&PeakGroup> = groups.iter().filter(|g| g.is_ghost()).collect();
        assert_eq!(parents.len(), 1);
        assert_eq!(ghosts.len(), 1);
        assert_eq!(parents[0].isotope_children.len(), 1);
        assert!((parents[0].isotope_children[0].mean_rt - 5.1).abs() < 0.01);
        assert_eq!(ghosts[0].isotope_children.len(), 1);
    }

    #[test]
    fn test_unannotated_groups_untouched() {
        let c = compound("c1");
        let mut untagged = group_at(&c, 5.0, 0.9);
        untagged.compound = None;
        let mut groups = vec![untagged, group_at(&c, 6.0, 0.8)];
        run(&mut groups);
        assert_eq!(groups.len(), 2);
    }
}
