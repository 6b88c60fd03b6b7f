//! Shared open set for the A* searches: a binary min-heap keyed by `f` with
//! an auxiliary map from node key to heap index so that rediscovering a node
//! via a cheaper path is a decrease-key instead of a duplicate entry
//!

use std::collections::HashMap;
use std::hash::Hash;

/// Min-heap of `(key, f)` pairs ordered by `f`
#[derive(Debug, Default)]
pub struct OpenSet<K: Copy + Eq + Hash> {
	/// Heap storage, element 0 is the minimum
	heap: Vec<(K, f32)>,
	/// Current heap index of every key in the heap
	positions: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> OpenSet<K> {
	/// Create a new instance of [OpenSet]
	pub fn new() -> Self {
		OpenSet {
			heap: Vec::new(),
			positions: HashMap::new(),
		}
	}
	/// Number of keys in the set
	pub fn len(&self) -> usize {
		self.heap.len()
	}
	/// Whether the set holds no keys
	pub fn is_empty(&self) -> bool {
		self.heap.is_empty()
	}
	/// Whether the key is currently in the set
	pub fn contains(&self, key: K) -> bool {
		self.positions.contains_key(&key)
	}
	/// Insert a key with priority `f`. If the key is already present its
	/// priority is lowered to `f` when cheaper, otherwise the call is a no-op
	pub fn push(&mut self, key: K, f: f32) {
		if let Some(&i) = self.positions.get(&key) {
			if f < self.heap[i].1 {
				self.heap[i].1 = f;
				self.sift_up(i);
			}
			return;
		}
		self.heap.push((key, f));
		let i = self.heap.len() - 1;
		self.positions.insert(key, i);
		self.sift_up(i);
	}
	/// Remove and return the key with the smallest `f`
	pub fn pop(&mut self) -> Option<(K, f32)> {
		if self.heap.is_empty() {
			return None;
		}
		let last = self.heap.len() - 1;
		self.heap.swap(0, last);
		let min = self.heap.pop();
		if let Some((key, _)) = min {
			self.positions.remove(&key);
		}
		if !self.heap.is_empty() {
			self.positions.insert(self.heap[0].0, 0);
			self.sift_down(0);
		}
		min
	}
	/// Restore the heap property upwards from index `i`
	fn sift_up(&mut self, mut i: usize) {
		while i > 0 {
			let parent = (i - 1) / 2;
			if self.heap[i].1 >= self.heap[parent].1 {
				break;
			}
			self.heap.swap(i, parent);
			self.positions.insert(self.heap[i].0, i);
			self.positions.insert(self.heap[parent].0, parent);
			i = parent;
		}
	}
	/// Restore the heap property downwards from index `i`
	fn sift_down(&mut self, mut i: usize) {
		loop {
			let left = 2 * i + 1;
			let right = 2 * i + 2;
			let mut smallest = i;
			if left < self.heap.len() && self.heap[left].1 < self.heap[smallest].1 {
				smallest = left;
			}
			if right < self.heap.len() && self.heap[right].1 < self.heap[smallest].1 {
				smallest = right;
			}
			if smallest == i {
				break;
			}
			self.heap.swap(i, smallest);
			self.positions.insert(self.heap[i].0, i);
			self.positions.insert(self.heap[smallest].0, smallest);
			i = smallest;
		}
	}
}
