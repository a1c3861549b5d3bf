use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical bucket a cache generation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Install manifest: shell, app manifest, icons, version document
    Static,
    /// Written lazily by both fetch strategies
    Dynamic,
    /// The root document served to offline navigations
    Root,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Static, Bucket::Root, Bucket::Dynamic];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Bucket::Static => "static",
            Bucket::Dynamic => "dynamic",
            Bucket::Root => "root",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, versioned cache bucket (`static-v2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    pub bucket: Bucket,
    pub tag: String,
}

impl CacheGeneration {
    pub fn new(bucket: Bucket, tag: impl Into<String>) -> Self {
        Self {
            bucket,
            tag: tag.into(),
        }
    }

    pub fn name(&self) -> String {
        format!("{}-{}", self.bucket, self.tag)
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bucket, self.tag)
    }
}

/// The current generation of every bucket.
///
/// Passed to the cache store manager at construction and never mutated;
/// a version bump means building a new set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSet {
    static_gen: CacheGeneration,
    dynamic_gen: CacheGeneration,
    root_gen: CacheGeneration,
}

impl GenerationSet {
    pub fn new(tag: &str) -> Self {
        Self {
            static_gen: CacheGeneration::new(Bucket::Static, tag),
            dynamic_gen: CacheGeneration::new(Bucket::Dynamic, tag),
            root_gen: CacheGeneration::new(Bucket::Root, tag),
        }
    }

    pub fn get(&self, bucket: Bucket) -> &CacheGeneration {
        match bucket {
            Bucket::Static => &self.static_gen,
            Bucket::Dynamic => &self.dynamic_gen,
            Bucket::Root => &self.root_gen,
        }
    }

    pub fn static_name(&self) -> String {
        self.static_gen.name()
    }

    pub fn dynamic_name(&self) -> String {
        self.dynamic_gen.name()
    }

    pub fn root_name(&self) -> String {
        self.root_gen.name()
    }

    /// Names in lookup order: static, root, dynamic.
    pub fn names(&self) -> Vec<String> {
        Bucket::ALL.iter().map(|b| self.get(*b).name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        Bucket::ALL.iter().any(|b| self.get(*b).name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_names() {
        let set = GenerationSet::new("v2");
        assert_eq!(set.names(), vec!["static-v2", "root-v2", "dynamic-v2"]);
        assert!(set.contains("dynamic-v2"));
        assert!(!set.contains("dynamic-v1"));
    }
}
