//! Global↔local index arithmetic for partitioned entity populations.
//!
//! A population of `N` entities is split into `P` contiguous blocks: the
//! first `N mod P` partitions hold `ceil(N / P)` entities and the rest hold
//! `floor(N / P)`. The mapping is deterministic and invertible, so any actor
//! can route a global id to its owner without consulting remote state.

use crate::error::NososError;
use crate::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMap {
    num_entities: u64,
    num_partitions: u64,
    first_global_id: Id,
}

impl PartitionMap {
    /// Creates a map over `num_entities` ids starting at `first_global_id`,
    /// split across `num_partitions` blocks. Both counts must be positive and
    /// there can be no more partitions than entities.
    #[must_use]
    pub fn new(num_entities: u64, num_partitions: usize, first_global_id: Id) -> PartitionMap {
        assert!(num_entities > 0, "partition map over empty population");
        assert!(
            num_partitions as u64 > 0 && num_partitions as u64 <= num_entities,
            "invalid partition count {num_partitions} for {num_entities} entities"
        );
        PartitionMap {
            num_entities,
            num_partitions: num_partitions as u64,
            first_global_id,
        }
    }

    fn small_block(&self) -> u64 {
        self.num_entities / self.num_partitions
    }

    /// Number of partitions holding one extra entity.
    fn num_large(&self) -> u64 {
        self.num_entities % self.num_partitions
    }

    fn offset_of(&self, global_id: Id) -> Result<u64, NososError> {
        if global_id < self.first_global_id
            || global_id >= self.first_global_id + self.num_entities
        {
            return Err(NososError::Index(format!(
                "global id {global_id} outside [{}, {})",
                self.first_global_id,
                self.first_global_id + self.num_entities
            )));
        }
        Ok(global_id - self.first_global_id)
    }

    /// The partition owning `global_id`.
    pub fn partition_of(&self, global_id: Id) -> Result<usize, NososError> {
        let offset = self.offset_of(global_id)?;
        let threshold = self.num_large() * (self.small_block() + 1);
        let partition = if offset < threshold {
            offset / (self.small_block() + 1)
        } else {
            self.num_large() + (offset - threshold) / self.small_block()
        };
        Ok(partition as usize)
    }

    /// The first global id owned by `partition`.
    #[must_use]
    pub fn first_global_id_of(&self, partition: usize) -> Id {
        let partition = partition as u64;
        assert!(partition < self.num_partitions, "partition {partition} out of range");
        let large = partition.min(self.num_large());
        let small = partition - large;
        self.first_global_id + large * (self.small_block() + 1) + small * self.small_block()
    }

    /// Number of entities owned by `partition`.
    #[must_use]
    pub fn local_count(&self, partition: usize) -> usize {
        let partition = partition as u64;
        assert!(partition < self.num_partitions, "partition {partition} out of range");
        if partition < self.num_large() {
            (self.small_block() + 1) as usize
        } else {
            self.small_block() as usize
        }
    }

    /// The position of `global_id` within `partition`, or an error if the
    /// partition does not own it.
    pub fn local_index(&self, global_id: Id, partition: usize) -> Result<usize, NososError> {
        let (owner, local) = self.locate(global_id)?;
        if owner != partition {
            return Err(NososError::Index(format!(
                "global id {global_id} belongs to partition {owner}, not {partition}"
            )));
        }
        Ok(local)
    }

    /// Resolves `global_id` to its `(partition, local index)` pair.
    pub fn locate(&self, global_id: Id) -> Result<(usize, usize), NososError> {
        let partition = self.partition_of(global_id)?;
        let local = global_id - self.first_global_id_of(partition);
        Ok((partition, local as usize))
    }

    /// Inverse of [`locate`](Self::locate).
    #[must_use]
    pub fn global_id(&self, partition: usize, local: usize) -> Id {
        self.first_global_id_of(partition) + local as u64
    }

    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.num_partitions as usize
    }

    #[must_use]
    pub fn num_entities(&self) -> u64 {
        self.num_entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_entities_three_partitions() {
        // Blocks of 4, 3, 3.
        let map = PartitionMap::new(10, 3, 0);
        for g in 0..=3 {
            assert_eq!(map.partition_of(g).unwrap(), 0);
        }
        for g in 4..=6 {
            assert_eq!(map.partition_of(g).unwrap(), 1);
        }
        for g in 7..=9 {
            assert_eq!(map.partition_of(g).unwrap(), 2);
        }
        assert_eq!(map.local_index(5, 1).unwrap(), 1);
        assert_eq!(map.local_count(0), 4);
        assert_eq!(map.local_count(1), 3);
        assert_eq!(map.local_count(2), 3);
        assert_eq!(map.first_global_id_of(2), 7);
    }

    #[test]
    fn round_trip_covers_every_id() {
        let map = PartitionMap::new(23, 5, 100);
        for g in 100..123 {
            let (partition, local) = map.locate(g).unwrap();
            assert_eq!(map.first_global_id_of(partition) + local as u64, g);
            assert_eq!(map.global_id(partition, local), g);
            assert!(local < map.local_count(partition));
        }
    }

    #[test]
    fn counts_sum_to_population() {
        let map = PartitionMap::new(17, 4, 0);
        let total: usize = (0..4).map(|p| map.local_count(p)).sum();
        assert_eq!(total, 17);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let map = PartitionMap::new(10, 3, 5);
        assert!(map.partition_of(4).is_err());
        assert!(map.partition_of(15).is_err());
        assert!(map.partition_of(5).is_ok());
        assert!(map.partition_of(14).is_ok());
    }

    #[test]
    fn wrong_partition_is_rejected() {
        let map = PartitionMap::new(10, 3, 0);
        assert!(map.local_index(5, 0).is_err());
    }

    #[test]
    fn even_split_has_uniform_blocks() {
        let map = PartitionMap::new(12, 4, 0);
        for p in 0..4 {
            assert_eq!(map.local_count(p), 3);
            assert_eq!(map.first_global_id_of(p), 3 * p as u64);
        }
    }
}
