//! Orbit partitioning under a finite group action.
//!
//! Objects are compared through a caller-supplied structural key, and the group acts
//! through a pure `(object, operator) -> object` function. Orbits are grown by
//! closure search from the first unvisited object, so the operator list may be the
//! whole group or any generating set.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{ExpansionError, Result};

/// Partitions `items` into orbits under `group`.
///
/// Orbit members are stored as the images the closure search produced (the first
/// member is the original representative), so any per-position data that was laid
/// out by the action is carried along. Fails if
/// - two items share a key,
/// - an image falls outside the input set,
/// - an image already belongs to a different orbit (the operators are not a group).
pub fn partition_orbits<T, G, K, A, F>(
    items: Vec<T>,
    group: &[G],
    act: A,
    key: F,
) -> Result<Vec<Vec<T>>>
where
    T: Clone + Debug,
    K: Eq + Hash,
    A: Fn(&T, &G) -> T,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if index.insert(key(item), i).is_some() {
            return Err(ExpansionError::DuplicateMember {
                member: format!("{:?}", item),
            });
        }
    }

    let mut orbit_of: Vec<Option<usize>> = vec![None; items.len()];
    let mut orbits: Vec<Vec<T>> = Vec::new();

    for start in 0..items.len() {
        if orbit_of[start].is_some() {
            continue;
        }
        let label = orbits.len();
        orbit_of[start] = Some(label);
        let mut orbit = vec![items[start].clone()];

        let mut cursor = 0;
        while cursor < orbit.len() {
            let current = orbit[cursor].clone();
            cursor += 1;
            for g in group {
                let image = act(&current, g);
                let j = *index
                    .get(&key(&image))
                    .ok_or_else(|| ExpansionError::OrbitNotClosed {
                        member: format!("{:?}", current),
                        image: format!("{:?}", image),
                    })?;
                match orbit_of[j] {
                    None => {
                        orbit_of[j] = Some(label);
                        orbit.push(image);
                    }
                    Some(l) if l != label => {
                        return Err(ExpansionError::NotAGroup {
                            member: format!("{:?}", image),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        orbits.push(orbit);
    }
    Ok(orbits)
}

/// Indices of the operators that map `item` onto itself.
pub fn stabilizer<T, G, K, A, F>(item: &T, group: &[G], act: A, key: F) -> Vec<usize>
where
    K: Eq,
    A: Fn(&T, &G) -> T,
    F: Fn(&T) -> K,
{
    let target = key(item);
    group
        .iter()
        .enumerate()
        .filter(|(_, g)| key(&act(item, g)) == target)
        .map(|(i, _)| i)
        .collect()
}

/// First operator index mapping `from` onto `to`, if any.
pub fn mapping_op<T, G, K, A, F>(from: &T, to: &T, group: &[G], act: A, key: F) -> Option<usize>
where
    K: Eq,
    A: Fn(&T, &G) -> T,
    F: Fn(&T) -> K,
{
    let target = key(to);
    group.iter().position(|g| key(&act(from, g)) == target)
}
