/// Fast non-cryptographic maps for node-keyed lookups.
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
