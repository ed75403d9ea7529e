//! Container workloads, registered in the `collections` library

use phasebench::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

fn size(test_case: &TestCase) -> anyhow::Result<u64> {
    let size = test_case.params().get_long("size")?;
    anyhow::ensure!(size > 0, "size must be positive, got {size}");
    Ok(size as u64)
}

/// Fill a fresh vector with `size` elements
#[driver(library = "collections")]
#[derive(Default)]
pub struct VecFill {
    size: u64,
}

impl BenchmarkDriver for VecFill {
    fn prepare(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        self.size = size(test_case)?;
        Ok(())
    }

    fn run(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        let data: Vec<u64> = (0..self.size).collect();
        black_box(data);
        Ok(())
    }
}

/// Insert `size` keys into a hash map
#[driver(library = "collections")]
#[derive(Default)]
pub struct HashInsert {
    size: u64,
}

impl BenchmarkDriver for HashInsert {
    fn prepare(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        self.size = size(test_case)?;
        Ok(())
    }

    fn run(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        let mut map = HashMap::with_capacity(self.size as usize);
        for key in 0..self.size {
            map.insert(key, key);
        }
        black_box(map);
        Ok(())
    }
}

/// Insert `size` keys into an ordered map
#[driver(library = "collections")]
#[derive(Default)]
pub struct TreeInsert {
    size: u64,
}

impl BenchmarkDriver for TreeInsert {
    fn prepare(&mut self, test_case: &TestCase) -> anyhow::Result<()> {
        self.size = size(test_case)?;
        Ok(())
    }

    fn run(&mut self, _test_case: &TestCase) -> anyhow::Result<()> {
        let mut map = BTreeMap::new();
        for key in 0..self.size {
            map.insert(key, key);
        }
        black_box(map);
        Ok(())
    }
}
