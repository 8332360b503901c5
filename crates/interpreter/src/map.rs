//! A sharded concurrent map

use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher},
	sync::RwLock,
};

/// Default shard count. A small prime spreads sequential keys.
const DEFAULT_SHARDS: usize = 11;

struct Shard<K, V> {
	data: RwLock<Vec<(K, V)>>,
}

/// A concurrent map sharded by key hash.
///
/// Each shard owns a small vector of entries behind a reader-writer
/// lock, so operations on different keys rarely contend. Values are
/// handed out by clone; wrap anything big in an [`std::sync::Arc`].
pub struct ShardedMap<K, V> {
	shards: Vec<Shard<K, V>>,
}

impl<K: Hash + Eq, V: Clone> ShardedMap<K, V> {
	/// Make a map with the default shard count
	pub fn new() -> Self {
		Self::with_shards(DEFAULT_SHARDS)
	}

	/// Make a map with the given shard count.
	///
	/// # Panics
	/// Panics if `shards` is zero.
	pub fn with_shards(shards: usize) -> Self {
		assert!(shards > 0, "shard count must be nonzero");
		Self {
			shards: (0..shards)
				.map(|_| Shard {
					data: RwLock::new(Vec::new()),
				})
				.collect(),
		}
	}

	fn shard(&self, key: &K) -> &Shard<K, V> {
		let mut hasher = DefaultHasher::new();
		key.hash(&mut hasher);
		&self.shards[(hasher.finish() as usize) % self.shards.len()]
	}

	/// Look up a key under its shard's shared lock
	pub fn get(&self, key: &K) -> Option<V> {
		let data = self.shard(key).data.read().unwrap();
		data.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
	}

	/// Insert a value unless the key is already present.
	///
	/// Returns the value now in the map and whether this call
	/// inserted it. An existing value is never replaced.
	pub fn insert(&self, key: K, value: V) -> (V, bool) {
		let mut data = self.shard(&key).data.write().unwrap();
		if let Some((_, v)) = data.iter().find(|(k, _)| *k == key) {
			(v.clone(), false)
		} else {
			data.push((key, value.clone()));
			(value, true)
		}
	}

	/// Remove a key under its shard's exclusive lock.
	/// Removing an absent key is a no-op.
	pub fn remove(&self, key: &K) {
		let mut data = self.shard(key).data.write().unwrap();
		if let Some(i) = data.iter().position(|(k, _)| k == key) {
			data.swap_remove(i);
		}
	}

	/// Count entries.
	///
	/// Acquires every shard exclusively before summing, so the count
	/// is a consistent snapshot. Slow; meant for diagnostics.
	pub fn len(&self) -> usize {
		let locks = self
			.shards
			.iter()
			.map(|s| s.data.write().unwrap())
			.collect::<Vec<_>>();
		locks.iter().map(|d| d.len()).sum()
	}

	/// Is the map empty?
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<K: Hash + Eq, V: Clone> Default for ShardedMap<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{sync::Arc, thread};

	#[test]
	fn insert_then_get() {
		let map = ShardedMap::new();
		let (value, inserted) = map.insert(1_usize, "one");
		assert!(inserted);
		assert_eq!(value, "one");
		assert_eq!(map.get(&1), Some("one"));
		assert_eq!(map.get(&2), None);
	}

	#[test]
	fn insert_keeps_the_existing_value() {
		let map = ShardedMap::new();
		map.insert(1_usize, "first");
		let (value, inserted) = map.insert(1, "second");
		assert!(!inserted);
		assert_eq!(value, "first");
		assert_eq!(map.get(&1), Some("first"));
	}

	#[test]
	fn remove_and_len() {
		let map = ShardedMap::with_shards(3);
		for k in 0..100_usize {
			map.insert(k, k * 2);
		}
		assert_eq!(map.len(), 100);
		map.remove(&40);
		map.remove(&40);
		assert_eq!(map.len(), 99);
		assert_eq!(map.get(&40), None);
		assert!(!map.is_empty());
	}

	#[test]
	fn concurrent_inserts_land_once() {
		let map = Arc::new(ShardedMap::new());
		let mut handles = Vec::new();
		for t in 0..4_usize {
			let map = map.clone();
			handles.push(thread::spawn(move || {
				for k in 0..250_usize {
					map.insert(k, t);
				}
			}));
		}
		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(map.len(), 250);
	}
}
